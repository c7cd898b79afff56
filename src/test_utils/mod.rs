pub mod repo_extensions;

pub use repo_extensions::{
    create_test_bare_repo, create_test_repo, test_options, test_options_for, RepoAssertions,
    RepoTestOperations,
};

#[cfg(unix)]
pub use repo_extensions::fake_git;

use crate::git::{error::Result, refs::model::Ref};

impl<'r> Ref<'r> {
    /// Whether `other` is reachable from this ref.
    pub fn contains(&self, other: &Ref<'_>) -> Result<bool> {
        if self.sha() == other.sha() {
            return Ok(true);
        }

        // Commits reachable from other but not from us
        let out = self
            .repo()
            .git(["rev-list", other.sha()])
            .arg(format!("^{}", self.sha()))
            .run()?
            .into_result()?;
        Ok(out.stdout().iter().all(u8::is_ascii_whitespace))
    }

    /// Commits on this ref with no equivalent change in `base`, as raw refs.
    pub fn cherry(&self, base: &Ref<'_>) -> Result<Vec<Ref<'r>>> {
        let out = self
            .repo()
            .git(["cherry", base.sha(), self.sha()])
            .run()?
            .into_result()?;

        Ok(out
            .stdout_str()
            .lines()
            .filter_map(|line| line.trim().strip_prefix("+ "))
            .map(|sha| Ref::raw(self.repo(), sha.trim()))
            .collect())
    }

    /// One-line log entries for the commits [`Ref::cherry`] reports.
    pub fn cherry_log(&self, base: &Ref<'_>) -> Result<Vec<String>> {
        let out = self
            .repo()
            .git([
                "log",
                "--cherry-pick",
                "--right-only",
                "--no-merges",
                "--oneline",
            ])
            .arg(format!("{}...{}", base.sha(), self.sha()))
            .run()?
            .into_result()?;

        Ok(out.stdout_str().lines().map(str::to_string).collect())
    }
}

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{OELensError, Result};

pub const LOG_FILE: &str = "log";
pub const REPORT_FILE: &str = "build.xml";

/// One build attempt of a Jenkins job, e.g. `<home>/jobs/<job>/builds/42`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDirectory {
    pub job_name: String,
    pub number: u32,
    pub path: PathBuf,
}

impl BuildDirectory {
    /// Derives job name and build number from a build directory path.
    ///
    /// The build number is the last path segment; the job name is the
    /// segment above the `builds` directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the last segment is not a build number or the path
    /// is too short to contain a job name.
    pub fn from_path(path: &Path) -> Result<Self> {
        let number = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(parse_build_number)
            .ok_or_else(|| {
                OELensError::Layout(format!("{} is not a numbered build", path.display()))
            })?;

        let job_name = path
            .parent()
            .and_then(Path::parent)
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                OELensError::Layout(format!("{} has no job directory", path.display()))
            })?;

        Ok(Self {
            job_name,
            number,
            path: path.to_path_buf(),
        })
    }

    pub fn log_file(&self) -> PathBuf {
        self.path.join(LOG_FILE)
    }

    pub fn report_file(&self) -> PathBuf {
        self.path.join(REPORT_FILE)
    }

    /// Whether both the build log and the build report are present.
    pub fn is_complete(&self) -> bool {
        self.log_file().is_file() && self.report_file().is_file()
    }
}

/// The `builds` directory of `job` under a Jenkins home.
pub fn builds_dir(jenkins_home: &Path, job: &str) -> PathBuf {
    jenkins_home.join("jobs").join(job).join("builds")
}

/// Lists the numerically named build directories in `builds_dir`, lowest
/// build number first.
///
/// Symlinks such as `lastSuccessfulBuild` and anything not named by a build
/// number are left out.
///
/// # Errors
///
/// Returns an error if the directory cannot be listed.
pub fn list_build_dirs(builds_dir: &Path) -> Result<Vec<PathBuf>> {
    let listing_error =
        |e: std::io::Error| OELensError::Layout(format!("Cannot list {}: {e}", builds_dir.display()));

    let mut builds = Vec::new();
    for entry in fs::read_dir(builds_dir).map_err(listing_error)? {
        let entry = entry.map_err(listing_error)?;
        if !entry.file_type().is_ok_and(|file_type| file_type.is_dir()) {
            continue;
        }
        let Some(number) = entry.file_name().to_str().and_then(parse_build_number) else {
            continue;
        };
        builds.push((number, entry.path()));
    }

    builds.sort_by_key(|(number, _)| *number);
    Ok(builds.into_iter().map(|(_, path)| path).collect())
}

fn parse_build_number(name: &str) -> Option<u32> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        let dir =
            BuildDirectory::from_path(Path::new("/jenkins/jobs/my-job-x-h15/builds/42")).unwrap();

        assert_eq!(dir.job_name, "my-job-x-h15");
        assert_eq!(dir.number, 42);
        assert_eq!(
            dir.report_file(),
            PathBuf::from("/jenkins/jobs/my-job-x-h15/builds/42/build.xml")
        );
        assert_eq!(
            dir.log_file(),
            PathBuf::from("/jenkins/jobs/my-job-x-h15/builds/42/log")
        );
    }

    #[test]
    fn test_from_path_rejects_non_numeric_builds() {
        assert!(BuildDirectory::from_path(Path::new("/j/jobs/a/builds/lastStable")).is_err());
        assert!(BuildDirectory::from_path(Path::new("/j/jobs/a/builds/-1")).is_err());
        assert!(BuildDirectory::from_path(Path::new("42")).is_err());
    }

    #[test]
    fn test_builds_dir() {
        assert_eq!(
            builds_dir(Path::new("/jenkins"), "starfish-drd4tv-official-h15"),
            PathBuf::from("/jenkins/jobs/starfish-drd4tv-official-h15/builds")
        );
    }

    #[test]
    fn test_list_build_dirs_filters_and_sorts() {
        let temp = tempfile::tempdir().unwrap();
        let builds = temp.path();
        for name in ["10", "9", "100", "lastSuccessfulBuild", "2020-01-01_10-00-00"] {
            fs::create_dir(builds.join(name)).unwrap();
        }
        fs::write(builds.join("11"), "not a directory").unwrap();

        let listed = list_build_dirs(builds).unwrap();
        let names: Vec<String> = listed
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["9", "10", "100"]);
    }

    #[test]
    fn test_list_build_dirs_missing_root_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let err = list_build_dirs(&temp.path().join("nope")).unwrap_err();
        assert!(err.to_string().contains("Cannot list"));
    }

    #[test]
    fn test_is_complete_requires_both_files() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("jobs/job/builds/7");
        fs::create_dir_all(&path).unwrap();
        let dir = BuildDirectory::from_path(&path).unwrap();

        assert!(!dir.is_complete());
        fs::write(dir.report_file(), "<build/>").unwrap();
        assert!(!dir.is_complete());
        fs::write(dir.log_file(), "").unwrap();
        assert!(dir.is_complete());
    }
}

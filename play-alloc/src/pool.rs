//! Audio pool layout and path resolution
//!
//! Filesystem layout: `<pool_root>/<survey>/files/<subfolder>/<NN>.mp3`, with the
//! subfolder counter file stored beside the subfolders. The public URL of a file
//! is the same relative path under `<public_prefix>`.
//!
//! Listings are sorted by name so an index into them means the same folder on
//! every call. The rotation counter still assumes the set of subfolders is
//! stable for the life of a survey: adding or removing a folder shifts which
//! name an index maps to.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::AllocError;

/// Extension of files eligible for allocation (case-sensitive)
pub const AUDIO_EXTENSION: &str = "mp3";

/// Counter record stored in each survey's audio root
pub const COUNTER_FILE_NAME: &str = "counterSubfolderSession.json";

/// Directory under `<pool_root>/<survey>` that holds the pool
const FILES_DIR: &str = "files";

/// Validated survey identifier
///
/// Restricted to ASCII alphanumerics, `-` and `_` so it can never escape the
/// pool root when joined into a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurveyId(String);

impl SurveyId {
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = !raw.is_empty()
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        valid.then(|| SurveyId(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SurveyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize a filesystem path into the string form used by the catalog and URLs
pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Where pools live on disk and where they are served from
#[derive(Debug, Clone)]
pub struct PoolLayout {
    pool_root: PathBuf,
    public_prefix: String,
}

impl PoolLayout {
    pub fn new(pool_root: impl Into<PathBuf>, public_prefix: &str) -> Self {
        Self {
            pool_root: pool_root.into(),
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn pool_root(&self) -> &Path {
        &self.pool_root
    }

    pub fn public_prefix(&self) -> &str {
        &self.public_prefix
    }

    /// `<pool_root>/<survey>/files`
    pub fn survey_root(&self, survey: &SurveyId) -> PathBuf {
        self.pool_root.join(survey.as_str()).join(FILES_DIR)
    }

    pub fn counter_path(&self, survey: &SurveyId) -> PathBuf {
        self.survey_root(survey).join(COUNTER_FILE_NAME)
    }

    /// Names of the immediate subdirectories of the survey's audio root, sorted
    ///
    /// A missing audio root lists as empty.
    pub fn list_subfolders(&self, survey: &SurveyId) -> io::Result<Vec<String>> {
        let root = self.survey_root(survey);
        let entries = match std::fs::read_dir(&root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Every `*.mp3` file directly under `<survey root>/<subfolder>`, sorted
    pub fn list_audio_files(&self, survey: &SurveyId, subfolder: &str) -> io::Result<Vec<PathBuf>> {
        let dir = self.survey_root(survey).join(subfolder);
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_file() && is_audio_file(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn survey_path_prefix(&self, survey: &SurveyId) -> String {
        format!(
            "{}/{}/{}/",
            normalize_path(&self.pool_root).trim_end_matches('/'),
            survey,
            FILES_DIR
        )
    }

    fn survey_url_prefix(&self, survey: &SurveyId) -> String {
        format!("{}/{}/{}/", self.public_prefix, survey, FILES_DIR)
    }

    /// Convert an absolute path under the survey's audio root into its public URL
    pub fn to_relative_url(
        &self,
        absolute_path: &Path,
        survey: Option<&SurveyId>,
    ) -> Result<String, AllocError> {
        let path = normalize_path(absolute_path);
        let survey = survey.ok_or_else(|| {
            AllocError::PathResolution(format!("{} (survey ID not available)", path))
        })?;

        let rest = path
            .strip_prefix(&self.survey_path_prefix(survey))
            .filter(|rest| is_clean_relative(rest))
            .ok_or_else(|| {
                AllocError::PathResolution(format!(
                    "{} is not under the audio root of survey {}",
                    path, survey
                ))
            })?;

        Ok(format!("{}{}", self.survey_url_prefix(survey), rest))
    }

    /// Inverse of [`PoolLayout::to_relative_url`]
    pub fn resolve_from_relative(
        &self,
        url: &str,
        survey: Option<&SurveyId>,
    ) -> Result<PathBuf, AllocError> {
        let survey = survey.ok_or_else(|| {
            AllocError::PathResolution(format!("{} (survey ID not available)", url))
        })?;

        let rest = url
            .strip_prefix(&self.survey_url_prefix(survey))
            .filter(|rest| is_clean_relative(rest))
            .ok_or_else(|| {
                AllocError::PathResolution(format!(
                    "{} is not under the public audio prefix of survey {}",
                    url, survey
                ))
            })?;

        Ok(PathBuf::from(format!("{}{}", self.survey_path_prefix(survey), rest)))
    }
}

fn is_audio_file(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(AUDIO_EXTENSION)
}

/// Non-empty relative remainder without `.`/`..`/empty segments
fn is_clean_relative(rest: &str) -> bool {
    !rest.is_empty()
        && rest
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn survey(id: &str) -> SurveyId {
        SurveyId::parse(id).unwrap()
    }

    fn layout() -> PoolLayout {
        PoolLayout::new("/var/www/audioSurvey/upload/surveys", "/audioSurvey/upload/surveys/")
    }

    #[test]
    fn test_survey_id_validation() {
        assert!(SurveyId::parse("42").is_some());
        assert!(SurveyId::parse("survey_42-b").is_some());
        assert!(SurveyId::parse("").is_none());
        assert!(SurveyId::parse("..").is_none());
        assert!(SurveyId::parse("42/../43").is_none());
        assert!(SurveyId::parse("42 ").is_none());
    }

    #[test]
    fn test_to_relative_url() {
        let url = layout()
            .to_relative_url(
                Path::new("/var/www/audioSurvey/upload/surveys/42/files/01/01.mp3"),
                Some(&survey("42")),
            )
            .unwrap();
        assert_eq!(url, "/audioSurvey/upload/surveys/42/files/01/01.mp3");
    }

    #[test]
    fn test_to_relative_url_rejects_other_survey() {
        let result = layout().to_relative_url(
            Path::new("/var/www/audioSurvey/upload/surveys/43/files/01/01.mp3"),
            Some(&survey("42")),
        );
        assert!(matches!(result, Err(AllocError::PathResolution(_))));
    }

    #[test]
    fn test_to_relative_url_requires_survey() {
        let result = layout().to_relative_url(
            Path::new("/var/www/audioSurvey/upload/surveys/42/files/01/01.mp3"),
            None,
        );
        assert!(matches!(result, Err(AllocError::PathResolution(_))));
    }

    #[test]
    fn test_outside_paths_always_fail() {
        let layout = layout();
        let s = survey("42");
        for path in [
            "/etc/passwd",
            "/var/www/audioSurvey/upload/surveys/42/files/",
            "/var/www/audioSurvey/upload/surveys/42/files/../../43/files/01/01.mp3",
            "/var/www/audioSurvey/upload/surveys/42/files01/01.mp3",
            "var/www/audioSurvey/upload/surveys/42/files/01/01.mp3",
        ] {
            assert!(
                layout.to_relative_url(Path::new(path), Some(&s)).is_err(),
                "{} should not resolve",
                path
            );
        }
        assert!(layout.resolve_from_relative("/elsewhere/42/files/01/01.mp3", Some(&s)).is_err());
        assert!(layout
            .resolve_from_relative("/audioSurvey/upload/surveys/42/files/../x.mp3", Some(&s))
            .is_err());
    }

    #[test]
    fn test_round_trip() {
        let layout = layout();
        let s = survey("42");
        for url in [
            "/audioSurvey/upload/surveys/42/files/01/01.mp3",
            "/audioSurvey/upload/surveys/42/files/17/99.mp3",
            "/audioSurvey/upload/surveys/42/files/counterSubfolderSession.json",
        ] {
            let path = layout.resolve_from_relative(url, Some(&s)).unwrap();
            assert_eq!(layout.to_relative_url(&path, Some(&s)).unwrap(), url);
        }
    }

    #[test]
    fn test_listings_are_sorted_and_filtered() {
        let temp = TempDir::new().unwrap();
        let layout = PoolLayout::new(temp.path(), "/upload/surveys");
        let s = survey("7");
        let root = layout.survey_root(&s);

        for dir in ["03", "01", "02"] {
            fs::create_dir_all(root.join(dir)).unwrap();
        }
        fs::write(root.join(COUNTER_FILE_NAME), "{}").unwrap();
        for file in ["05.mp3", "01.mp3", "notes.txt", "02.MP3"] {
            fs::write(root.join("01").join(file), b"ID3").unwrap();
        }
        fs::create_dir_all(root.join("01").join("nested.mp3")).unwrap();

        assert_eq!(layout.list_subfolders(&s).unwrap(), vec!["01", "02", "03"]);

        let files = layout.list_audio_files(&s, "01").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["01.mp3", "05.mp3"]);
    }

    #[test]
    fn test_missing_survey_root_lists_empty() {
        let temp = TempDir::new().unwrap();
        let layout = PoolLayout::new(temp.path(), "/upload/surveys");
        assert!(layout.list_subfolders(&survey("404")).unwrap().is_empty());
    }
}

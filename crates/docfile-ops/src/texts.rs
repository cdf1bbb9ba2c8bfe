//! Localized string lookup.

use strum::Display;

/// Keys of user-visible strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TextKey {
    Done,
    Deleted,
    Renamed,
    Uploaded,
    Failed,
    DeleteFileTitle,
    /// `{0}` is the file name.
    DeleteFileMessage,
    RenameTitle,
    StatusDialogTitle,
    NothingChanged,
    FileProcessError,
}

/// Localized string service.
pub trait Texts: Send + Sync {
    fn text(&self, key: TextKey) -> String;

    /// Text with `{0}`, `{1}`, ... replaced by `args`.
    fn format(&self, key: TextKey, args: &[&str]) -> String {
        args.iter()
            .enumerate()
            .fold(self.text(key), |text, (i, arg)| {
                text.replace(&format!("{{{i}}}"), arg)
            })
    }
}

/// Built-in English bundle.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnglishTexts;

impl Texts for EnglishTexts {
    fn text(&self, key: TextKey) -> String {
        match key {
            TextKey::Done => "Done",
            TextKey::Deleted => "Deleted",
            TextKey::Renamed => "Renamed",
            TextKey::Uploaded => "Uploaded",
            TextKey::Failed => "Failed",
            TextKey::DeleteFileTitle => "Delete file",
            TextKey::DeleteFileMessage => "Do you really want to delete \"{0}\"?",
            TextKey::RenameTitle => "Change file name",
            TextKey::StatusDialogTitle => "File status",
            TextKey::NothingChanged => "Nothing has changed",
            TextKey::FileProcessError => "Some files could not be processed",
        }
        .to_string()
    }
}

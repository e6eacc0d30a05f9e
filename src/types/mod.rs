pub mod error;
pub mod word;

pub use error::{Result, ResultExt, WallError};
pub use word::{
    NewWord, ProcessingStatus, Section, SectionResult, Word, WordPatch, normalize_word,
};

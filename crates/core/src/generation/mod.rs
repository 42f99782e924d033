//! Chapter generation: one chapter, one model, then every model.

mod book;
mod chapter;
mod result;
mod run;

pub use book::{book_file_name, book_path, chapter_title, compile_book, BOOK_TITLE};
pub use chapter::ChapterGenerator;
pub use result::{count_words, ChapterMetadata, GenerationResult, ModelRunSummary};
pub use run::{
    CrossModelRunner, GenerationError, ModelRunner, Publication, RunOutcome, RunSummary,
};

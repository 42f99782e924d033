use std::path::{Path, PathBuf};

use crate::models::Tier;
use crate::store::{ArtifactStore, StoreError};

pub const BOOK_TITLE: &str = "AR7 Working Group II - Complete Assessment";

/// `chapter_7_africa` becomes `Chapter 7 Africa`.
pub fn chapter_title(chapter_key: &str) -> String {
    chapter_key
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn book_file_name(model_id: &str, tier: Tier) -> String {
    let prefix = match tier {
        Tier::Lite => "AR7_COMPLETE_BOOK",
        Tier::Full => "AR7_PREMIUM_BOOK",
    };
    format!("{prefix}_{}.md", model_id.to_uppercase())
}

pub fn book_path(store: &ArtifactStore, model_id: &str, tier: Tier) -> PathBuf {
    store.model_dir(model_id).join(book_file_name(model_id, tier))
}

/// Concatenates the stored chapters of one model into a markdown book.
///
/// Chapters without a text file are left out. Returns `None` when none of
/// the requested chapters exist.
pub fn compile_book(
    store: &ArtifactStore,
    model_id: &str,
    tier: Tier,
    chapter_keys: &[String],
    generated_at: &str,
) -> Result<Option<PathBuf>, StoreError> {
    let mut body = String::new();
    let mut included = 0usize;
    for key in chapter_keys {
        let Some(text) = store.read_chapter(model_id, key)? else {
            continue;
        };
        body.push_str(&format!("# {}\n\n", chapter_title(key)));
        body.push_str(&text);
        body.push_str("\n\n---\n\n");
        included += 1;
    }

    if included == 0 {
        return Ok(None);
    }

    let mut book = format!("# {BOOK_TITLE}\n\n");
    book.push_str(&format!("**Model**: {model_id}\n"));
    book.push_str(&format!("**Tier**: {}\n", tier.label()));
    book.push_str(&format!("**Generated**: {generated_at}\n\n"));
    book.push_str("---\n\n");
    book.push_str(&body);

    let relative = Path::new(model_id).join(book_file_name(model_id, tier));
    store.write_text(relative, &book).map(Some)
}

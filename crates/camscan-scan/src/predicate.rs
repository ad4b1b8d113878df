//! Reusable item predicates.
//!
//! A [`Predicate`] decides whether a discovered item belongs in the scan
//! result. Predicates run on the runtime's worker threads while listings
//! complete, so they must be cheap and must not block.

use std::sync::Arc;

use camscan_core::FileSystemItem;
use globset::{GlobBuilder, GlobSetBuilder};

/// Caller-supplied test applied to every discovered item.
pub type Predicate = Arc<dyn Fn(&FileSystemItem) -> bool + Send + Sync>;

/// Wrap a closure as a [`Predicate`].
pub fn from_fn<F>(f: F) -> Predicate
where
    F: Fn(&FileSystemItem) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Match items whose extension is one of `extensions`, ignoring case.
///
/// Extensions are given without the leading dot.
pub fn extension<I, S>(extensions: I) -> Predicate
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let extensions: Vec<String> = extensions
        .into_iter()
        .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_uppercase())
        .collect();

    Arc::new(move |item| {
        item.extension()
            .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    })
}

/// Match items whose name matches any of the glob `patterns`, ignoring case.
pub fn glob<I, S>(patterns: I) -> Result<Predicate, globset::Error>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(
            GlobBuilder::new(pattern.as_ref())
                .case_insensitive(true)
                .literal_separator(true)
                .build()?,
        );
    }
    let set = builder.build()?;

    Ok(Arc::new(move |item| set.is_match(item.name.as_str())))
}

/// Match still images, plus items whose metadata has not loaded yet.
///
/// Cameras often hand out items before their names are known; those are
/// usually images too, and dropping them would hide most of a fresh card.
pub fn images_or_unloaded() -> Predicate {
    Arc::new(|item| item.is_known_image_type() || (item.is_file() && !item.metadata_loaded))
}

/// Match items accepted by every predicate in `predicates`.
pub fn all_of(predicates: Vec<Predicate>) -> Predicate {
    Arc::new(move |item| predicates.iter().all(|p| p(item)))
}

/// Match items accepted by at least one predicate in `predicates`.
pub fn any_of(predicates: Vec<Predicate>) -> Predicate {
    Arc::new(move |item| predicates.iter().any(|p| p(item)))
}

//! Description injection: append an annotation after every image reference.
//!
//! Replacement is textual and global on the literal `(target)` closing the
//! image link, so every occurrence of a target gets the same annotation and
//! identical targets are treated as the same image. Running the injector on
//! its own output annotates again: callers inject exactly once.

use crate::output::DescriptionMap;
use crate::prompts::annotation_block;

/// Return `original` with each described image followed by its annotation.
///
/// Failure sentinels are injected like any other description so the failure
/// stays visible in the document. Iteration follows the map's key order,
/// which makes the output independent of the order descriptions completed.
pub fn inject_descriptions(original: &str, descriptions: &DescriptionMap) -> String {
    descriptions
        .iter()
        .fold(original.to_string(), |text, (target, result)| {
            let needle = format!("({})", target);
            let replacement = format!("{}{}", needle, annotation_block(&result.description));
            text.replace(&needle, &replacement)
        })
}

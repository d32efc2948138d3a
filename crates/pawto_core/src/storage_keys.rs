//! Object-storage key layout for a collection.
//!
//! Uploaded photos live under `{collection_id}/sks/` and the generation job
//! writes its output under `{collection_id}/results/`.

const SOURCE_IMAGE_DIR: &str = "sks";
const RESULTS_DIR: &str = "results";
const RESULT_INDEX_OPEN: &str = "result (";
const RESULT_INDEX_CLOSE: char = ')';

pub fn source_images_prefix(collection_id: &str) -> String {
    format!("{collection_id}/{SOURCE_IMAGE_DIR}/")
}

/// Key of the `index`-th uploaded photo; indices start at 1.
pub fn source_image_key(collection_id: &str, index: usize) -> String {
    format!(
        "{}{SOURCE_IMAGE_DIR} ({index}).jpg",
        source_images_prefix(collection_id)
    )
}

pub fn results_prefix(collection_id: &str) -> String {
    format!("{collection_id}/{RESULTS_DIR}/")
}

/// Integer embedded in a result file name such as `results/result (12).png`.
pub fn result_index(key: &str) -> Option<u64> {
    let file_name = key.rsplit('/').next().unwrap_or(key);
    let start = file_name.find(RESULT_INDEX_OPEN)? + RESULT_INDEX_OPEN.len();
    let rest = &file_name[start..];
    let end = rest.find(RESULT_INDEX_CLOSE)?;
    rest[..end].trim().parse().ok()
}

/// Orders result keys by their embedded index; keys without one go last in
/// lexical order.
pub fn sort_result_keys(keys: &mut [String]) {
    keys.sort_by_cached_key(|key| match result_index(key) {
        Some(index) => (0u8, index, key.clone()),
        None => (1u8, 0, key.clone()),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_source_image_key() {
        assert_eq!(source_image_key("c-1", 3), "c-1/sks/sks (3).jpg");
        assert_eq!(source_images_prefix("c-1"), "c-1/sks/");
    }

    #[test]
    fn builds_results_prefix() {
        assert_eq!(results_prefix("c-1"), "c-1/results/");
    }

    #[test]
    fn extracts_result_index_from_file_name() {
        assert_eq!(result_index("c-1/results/result (12).png"), Some(12));
        assert_eq!(result_index("c-1/results/result ( 4 ).png"), Some(4));
        assert_eq!(result_index("c-1/results/cover.png"), None);
        assert_eq!(result_index("c-1/results/result (x).png"), None);
    }

    #[test]
    fn sorts_numerically_not_lexically() {
        let mut keys = vec![
            "c-1/results/result (10).png".to_string(),
            "c-1/results/notes.txt".to_string(),
            "c-1/results/result (2).png".to_string(),
            "c-1/results/result (1).png".to_string(),
        ];
        sort_result_keys(&mut keys);

        assert_eq!(
            keys,
            vec![
                "c-1/results/result (1).png",
                "c-1/results/result (2).png",
                "c-1/results/result (10).png",
                "c-1/results/notes.txt",
            ]
        );
    }
}

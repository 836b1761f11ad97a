use std::path::{Component, Path};

/// Path of `target` as seen from the directory `from_dir`, `/`-separated for
/// use in a Markdown link. Both paths should be absolute.
pub fn relative_link(from_dir: &Path, target: &Path) -> String {
    let from: Vec<Component<'_>> = from_dir.components().collect();
    let to: Vec<Component<'_>> = target.components().collect();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    parts.extend(from[common..].iter().map(|_| "..".to_string()));
    parts.extend(
        to[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sibling_directory() {
        assert_eq!(
            relative_link(Path::new("/notes"), Path::new("/notes/pdfs/He_2015_X.pdf")),
            "pdfs/He_2015_X.pdf"
        );
    }

    #[test]
    fn test_nested_note() {
        assert_eq!(
            relative_link(
                Path::new("/notes/vision/cnn"),
                Path::new("/notes/pdfs/He_2015_X.pdf")
            ),
            "../../pdfs/He_2015_X.pdf"
        );
    }

    #[test]
    fn test_pdf_dir_outside_root() {
        assert_eq!(
            relative_link(Path::new("/home/u/notes"), Path::new("/data/papers/a.pdf")),
            "../../../data/papers/a.pdf"
        );
    }
}

use paperwatch_core::PaperMetadata;

const MAX_LISTED_AUTHORS: usize = 3;

/// Render the citation that replaces a raw link:
///
/// `**{title}**. {authors} {venue}, {year} ([PDF]({pdf})) ([source]({url})) (Citations: {n})`
///
/// More than three authors are cut to three plus `et al.`. The PDF group is
/// left out when there is no local copy; an unknown count renders as `N/A`.
pub fn format_citation(
    metadata: &PaperMetadata,
    citations: Option<u64>,
    pdf_link: Option<&str>,
    source_url: &str,
) -> String {
    let mut out = format!("**{}**. ", metadata.title);

    if !metadata.authors.is_empty() {
        let listed = metadata
            .authors
            .iter()
            .take(MAX_LISTED_AUTHORS)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&listed);
        if metadata.authors.len() > MAX_LISTED_AUTHORS {
            out.push_str(" et al.");
        }
        out.push(' ');
    }

    let venue = metadata
        .venue
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("arXiv");
    let year = metadata
        .year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    out.push_str(&format!("{venue}, {year}"));

    if let Some(pdf) = pdf_link {
        out.push_str(&format!(" ([PDF]({pdf}))"));
    }
    out.push_str(&format!(" ([source]({source_url}))"));

    match citations {
        Some(count) => out.push_str(&format!(" (Citations: {count})")),
        None => out.push_str(" (Citations: N/A)"),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::fakes::resnet;

    #[test]
    fn test_resnet_citation() {
        let line = format_citation(
            &resnet(),
            Some(195432),
            Some("pdfs/He_2015_Deep Residual Learning for Image Recognition.pdf"),
            "https://arxiv.org/abs/1512.03385",
        );
        assert_eq!(
            line,
            "**Deep Residual Learning for Image Recognition**. Kaiming He, Xiangyu Zhang, \
             Shaoqing Ren et al. arXiv:cs.CV, 2015 \
             ([PDF](pdfs/He_2015_Deep Residual Learning for Image Recognition.pdf)) \
             ([source](https://arxiv.org/abs/1512.03385)) (Citations: 195432)"
        );
    }

    #[test]
    fn test_missing_pieces() {
        let metadata = PaperMetadata {
            title: "Attention Is All You Need".to_string(),
            authors: vec!["Ashish Vaswani".to_string(), "Noam Shazeer".to_string()],
            venue: None,
            year: None,
        };
        assert_eq!(
            format_citation(&metadata, None, None, "https://arxiv.org/abs/1706.03762"),
            "**Attention Is All You Need**. Ashish Vaswani, Noam Shazeer arXiv, Unknown \
             ([source](https://arxiv.org/abs/1706.03762)) (Citations: N/A)"
        );
    }
}

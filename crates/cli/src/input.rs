//! Loading requirements files.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use pipeline::{ImagePayload, RequirementsInput};

const TEXT_EXTENSIONS: &[&str] = &["txt", "md"];

/// Reads text files as requirements and everything else as images.
///
/// Text files are joined in argument order, separated by a blank line.
/// Files whose MIME type is not `image/*` are refused.
pub fn load_requirements(paths: &[PathBuf]) -> anyhow::Result<RequirementsInput> {
    let mut texts = Vec::new();
    let mut images = Vec::new();

    for path in paths {
        if is_text(path) {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            texts.push(text);
            continue;
        }

        let mime = mime_guess::from_path(path).first_or_octet_stream();
        if mime.type_() != mime_guess::mime::IMAGE {
            bail!(
                "{} is neither a text file nor an image ({})",
                path.display(),
                mime
            );
        }
        let bytes =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        images.push(ImagePayload {
            bytes,
            mime_type: mime.essence_str().to_string(),
        });
    }

    Ok(RequirementsInput {
        text: texts.join("\n\n"),
        images,
    })
}

fn is_text(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            TEXT_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

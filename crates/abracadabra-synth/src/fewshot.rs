//! Few-shot corpus: worked instruction/program pairs shown to the
//! collaborator before the real request.
//!
//! An example file starts with a block of `#` lines holding the instruction
//! (and the locals it was written against); everything after that block is
//! the reference program.

use std::fs;
use std::path::Path;

use crate::error::SynthError;

const BUILTIN: &[(&str, &str)] = &[
    (
        "astronaut_portraits.py",
        include_str!("../fewshot/astronaut_portraits.py"),
    ),
    ("blur_background.py", include_str!("../fewshot/blur_background.py")),
    ("improve_faces.py", include_str!("../fewshot/improve_faces.py")),
    ("make_cat.py", include_str!("../fewshot/make_cat.py")),
    ("make_cat2.py", include_str!("../fewshot/make_cat2.py")),
    ("prune_by_mask.py", include_str!("../fewshot/prune_by_mask.py")),
    ("remove_cars.py", include_str!("../fewshot/remove_cars.py")),
    ("split_day_night.py", include_str!("../fewshot/split_day_night.py")),
    ("upscale_details.py", include_str!("../fewshot/upscale_details.py")),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    /// File name the example came from.
    pub name: String,
    pub instruction: String,
    pub program: String,
}

impl Example {
    /// Splits example text into its instruction header and program.
    pub fn parse(name: impl Into<String>, text: &str) -> Self {
        let mut instruction = Vec::new();
        let mut rest = text;
        while let Some(comment) = rest.strip_prefix('#') {
            let (line, tail) = comment.split_once('\n').unwrap_or((comment, ""));
            instruction.push(line.trim());
            rest = tail;
        }

        Example {
            name: name.into(),
            instruction: instruction.join("\n"),
            program: rest.trim_start_matches(['\r', '\n']).to_string(),
        }
    }
}

/// The corpus shipped with the crate.
pub fn builtin_examples() -> Vec<Example> {
    BUILTIN
        .iter()
        .map(|(name, text)| Example::parse(*name, text))
        .collect()
}

/// Loads every regular file in `dir`, in file-name order.
pub fn load_examples(dir: impl AsRef<Path>) -> Result<Vec<Example>, SynthError> {
    let dir = dir.as_ref();
    let io_err = |source: std::io::Error| SynthError::Examples {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if entry.file_type().map_err(io_err)?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();

    files
        .into_iter()
        .map(|path| {
            let text = fs::read_to_string(&path).map_err(|source| SynthError::Examples {
                path: path.clone(),
                source,
            })?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(Example::parse(name, &text))
        })
        .collect()
}

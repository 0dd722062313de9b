use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

/// Overrides OCR model discovery.
pub const ASSETS_DIR_ENV: &str = "SCOUT_ASSETS_DIR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrAssets {
	pub detection: PathBuf,
	pub recognition: PathBuf,
	pub charset: PathBuf,
}

fn normalize_ocr_dir(dir: PathBuf) -> PathBuf {
	// Accept either the folder containing `ocr/` or `ocr/` itself.
	if dir.join("detection.mnn").is_file() {
		dir
	} else {
		dir.join("ocr")
	}
}

/// Look for `ocr/detection.mnn`, `ocr/<lang>_recognition.mnn` and
/// `ocr/<lang>_charset.txt` under each of `bases`, first hit wins.
pub fn find_ocr_assets<I>(lang_code: &str, bases: I) -> Result<OcrAssets>
where
	I: IntoIterator<Item = PathBuf>,
{
	let recognition_name = format!("{lang_code}_recognition.mnn");
	let charset_name = format!("{lang_code}_charset.txt");

	let mut tried = Vec::new();
	for base in bases {
		let ocr_dir = normalize_ocr_dir(base);
		let detection = ocr_dir.join("detection.mnn");
		let recognition = ocr_dir.join(&recognition_name);
		let charset = ocr_dir.join(&charset_name);

		if detection.is_file() && recognition.is_file() && charset.is_file() {
			return Ok(OcrAssets { detection, recognition, charset });
		}

		tried.push(ocr_dir);
	}

	bail!(
		"OCR model files not found. Expected these files:\n  - ocr/detection.mnn\n  - ocr/{recognition_name}\n  - ocr/{charset_name}\n\nSearched in:\n{}\n\nFix: copy the 'ocr/' folder next to the executable (or set {ASSETS_DIR_ENV} to the folder that contains it).",
		tried
			.into_iter()
			.map(|p| format!("  - {}", p.display()))
			.collect::<Vec<_>>()
			.join("\n")
	)
}

/// Resolve OCR model paths from `$SCOUT_ASSETS_DIR`, the executable's folder,
/// the working directory, and in debug builds the workspace root.
pub fn resolve_ocr_assets(lang_code: &str) -> Result<OcrAssets> {
	let mut candidates: Vec<PathBuf> = Vec::new();
	if let Some(dir) = std::env::var_os(ASSETS_DIR_ENV) {
		candidates.push(PathBuf::from(dir));
	}
	if let Ok(exe) = std::env::current_exe()
		&& let Some(dir) = exe.parent()
	{
		candidates.push(dir.to_path_buf());
	}
	if let Ok(cwd) = std::env::current_dir() {
		candidates.push(cwd);
	}
	#[cfg(debug_assertions)]
	candidates.push(Path::new(env!("CARGO_MANIFEST_DIR")).join(".."));

	find_ocr_assets(lang_code, candidates)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;

	fn install(dir: &Path, lang: &str) {
		fs::create_dir_all(dir).expect("mkdir");
		for name in ["detection.mnn".to_string(), format!("{lang}_recognition.mnn"), format!("{lang}_charset.txt")] {
			fs::write(dir.join(name), b"x").expect("write");
		}
	}

	#[test]
	fn finds_nested_ocr_folder() {
		let root = tempfile::tempdir().expect("tempdir");
		install(&root.path().join("ocr"), "latin");
		let assets = find_ocr_assets("latin", [root.path().to_path_buf()]).expect("assets");
		assert_eq!(assets.detection, root.path().join("ocr").join("detection.mnn"));
		assert_eq!(assets.charset, root.path().join("ocr").join("latin_charset.txt"));
	}

	#[test]
	fn accepts_ocr_folder_directly() {
		let root = tempfile::tempdir().expect("tempdir");
		install(root.path(), "latin");
		let assets = find_ocr_assets("latin", [root.path().to_path_buf()]).expect("assets");
		assert_eq!(assets.recognition, root.path().join("latin_recognition.mnn"));
	}

	#[test]
	fn missing_language_lists_searched_dirs() {
		let root = tempfile::tempdir().expect("tempdir");
		install(&root.path().join("ocr"), "latin");
		let err = find_ocr_assets("korean", [root.path().to_path_buf()]).expect_err("no korean models");
		let msg = err.to_string();
		assert!(msg.contains("korean_recognition.mnn"));
		assert!(msg.contains(&root.path().join("ocr").display().to_string()));
	}
}

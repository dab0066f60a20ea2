//! `mistake manifest <images-dir> [output]`: write the image manifest.

use anyhow::{Context, Result, bail};
use regex::Regex;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};

const MANIFEST_FILE: &str = "image-manifest.json";

static IMAGE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(png|jpe?g|gif|svg)$").expect("valid image name regex"));

pub fn run(args: &[String]) -> Result<()> {
    let Some(images_dir) = args.first() else {
        bail!("usage: mistake manifest <images-dir> [output]");
    };
    let images_dir = PathBuf::from(images_dir);
    let output = args
        .get(1)
        .map_or_else(|| default_output(&images_dir), PathBuf::from);

    let names = collect_images(&images_dir)?;
    write_manifest(&output, &names)?;
    tracing::info!(
        dir = %images_dir.display(),
        output = %output.display(),
        images = names.len(),
        "Image manifest generated"
    );
    println!(
        "Image manifest generated successfully: {} images -> {}",
        names.len(),
        output.display()
    );
    Ok(())
}

/// `image-manifest.json` next to the images directory.
fn default_output(images_dir: &Path) -> PathBuf {
    match images_dir.parent() {
        Some(parent) => parent.join(MANIFEST_FILE),
        None => PathBuf::from(MANIFEST_FILE),
    }
}

/// Sorted image file names directly under `dir`.
fn collect_images(dir: &Path) -> Result<Vec<String>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("Error reading images directory {}", dir.display()))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Error reading {}", dir.display()))?;
        if !entry.file_type().is_ok_and(|t| t.is_file()) {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            tracing::warn!(path = %entry.path().display(), "Skipping non-UTF-8 file name");
            continue;
        };
        if IMAGE_NAME.is_match(&name) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

fn write_manifest(output: &Path, names: &[String]) -> Result<()> {
    let json = serde_json::to_string_pretty(names)?;
    fs::write(output, json).with_context(|| format!("Error writing manifest {}", output.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn filters_and_sorts_images() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.PNG", "a.jpg", "c.jpeg", "notes.txt", "d.gif", "e.svg", "f.webp", "png"] {
            touch(dir.path(), name);
        }
        fs::create_dir(dir.path().join("nested.png")).unwrap();

        let names = collect_images(dir.path()).unwrap();
        assert_eq!(names, vec!["a.jpg", "b.PNG", "c.jpeg", "d.gif", "e.svg"]);
    }

    #[test]
    fn default_output_sits_beside_the_directory() {
        assert_eq!(
            default_output(Path::new("public/images")),
            PathBuf::from("public").join(MANIFEST_FILE)
        );
    }

    #[test]
    fn run_writes_pretty_json() {
        let root = tempfile::tempdir().unwrap();
        let images = root.path().join("images");
        fs::create_dir(&images).unwrap();
        touch(&images, "z.png");
        touch(&images, "a.gif");

        run(&[images.display().to_string()]).unwrap();

        let written = fs::read_to_string(root.path().join(MANIFEST_FILE)).unwrap();
        assert_eq!(written, "[\n  \"a.gif\",\n  \"z.png\"\n]");
        let parsed: Vec<String> = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, vec!["a.gif", "z.png"]);
    }

    #[test]
    fn run_honours_explicit_output() {
        let root = tempfile::tempdir().unwrap();
        touch(root.path(), "x.png");
        let output = root.path().join("custom.json");

        run(&[root.path().display().to_string(), output.display().to_string()]).unwrap();
        assert!(output.exists());
    }

    #[test]
    fn missing_directory_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let err = run(&[root.path().join("nope").display().to_string()]).unwrap_err();
        assert!(err.to_string().contains("Error reading images directory"));
    }

    #[test]
    fn missing_arguments_is_an_error() {
        assert!(run(&[]).is_err());
    }
}

//! Python target-script generation.
//!
//! After every successful save the annotation set is re-exported as a small
//! Python module the automation framework imports: one entry per region with
//! its relative rectangle and the click anchor derived from `targetPos`.
//! Generation is best-effort; a failure here never fails the save.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::annotation::Annotation;
use crate::geometry::Rect;

/// Turn a free-form label into a Python identifier. Collisions get a numeric
/// suffix so every region stays addressable.
fn identifier(label: &str, taken: &[String]) -> String {
    let mut base: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    while base.contains("__") {
        base = base.replace("__", "_");
    }
    let base = base.trim_matches('_');
    let mut base = if base.is_empty() || base.starts_with(|c: char| c.is_ascii_digit()) {
        format!("region_{base}")
    } else {
        base.to_owned()
    };
    if taken.contains(&base) {
        let mut n = 2;
        while taken.contains(&format!("{base}_{n}")) {
            n += 1;
        }
        base = format!("{base}_{n}");
    }
    base
}

/// Render the Python module for one screenshot's annotation set.
pub fn python_module(screenshot_id: &str, source_size: Rect, annotations: &[Annotation]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Generated by uimark from '{screenshot_id}'. Do not edit by hand.");
    let _ = writeln!(
        out,
        "# Regions are (x, y, width, height) relative to the source screenshot;"
    );
    let _ = writeln!(out, "# anchors are the click point inside each region.\n");
    let _ = writeln!(
        out,
        "SOURCE_SIZE = ({}, {})\n",
        source_size.width.round() as i64,
        source_size.height.round() as i64
    );

    let mut names: Vec<String> = Vec::with_capacity(annotations.len());
    for annotation in annotations {
        names.push(identifier(&annotation.label, &names));
    }

    let _ = writeln!(out, "REGIONS = {{");
    for (annotation, name) in annotations.iter().zip(&names) {
        let r = annotation.rect;
        let _ = writeln!(
            out,
            "    \"{name}\": ({:.4}, {:.4}, {:.4}, {:.4}),",
            r.x / source_size.width,
            r.y / source_size.height,
            r.width / source_size.width,
            r.height / source_size.height,
        );
    }
    let _ = writeln!(out, "}}\n");

    let _ = writeln!(out, "ANCHORS = {{");
    for (annotation, name) in annotations.iter().zip(&names) {
        let anchor = annotation.target_pos.anchor_in(annotation.rect);
        let _ = writeln!(
            out,
            "    \"{name}\": ({:.4}, {:.4}),",
            anchor.x / source_size.width,
            anchor.y / source_size.height,
        );
    }
    let _ = writeln!(out, "}}\n\n");

    out.push_str(
        "def region_pixels(name, width, height):\n\
         \x20   rx, ry, rw, rh = REGIONS[name]\n\
         \x20   return (int(rx * width), int(ry * height), int(rw * width), int(rh * height))\n\
         \n\
         \n\
         def click_point(name, width, height):\n\
         \x20   ax, ay = ANCHORS[name]\n\
         \x20   return (int(ax * width), int(ay * height))\n",
    );
    out
}

/// Where the generated module lives: next to the screenshot, e.g.
/// `login.png` -> `login_targets.py`.
pub fn script_path(image_path: &Path) -> PathBuf {
    let stem = image_path
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned();
    image_path.with_file_name(format!("{stem}_targets.py"))
}

pub fn write_script(
    image_path: &Path,
    screenshot_id: &str,
    source_size: Rect,
    annotations: &[Annotation],
) -> Result<PathBuf> {
    let path = script_path(image_path);
    let code = python_module(screenshot_id, source_size, annotations);
    std::fs::write(&path, code).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

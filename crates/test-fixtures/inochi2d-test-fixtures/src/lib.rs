//! Shared puppet fixtures for integration tests.
//!
//! Puppet JSON lives under `fixtures/puppets`; textures are described in the
//! manifest as solid-colour images and encoded to PNG on demand, so the
//! repository carries no binary blobs.

use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{anyhow, Context, Result};
use image::{ImageFormat, Rgba, RgbaImage};
use inochi2d_core::{write_inp, InpFile, InpTexture, TextureEncoding};
use once_cell::sync::Lazy;
use serde::Deserialize;

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    puppets: HashMap<String, PuppetEntry>,
}

#[derive(Debug, Deserialize)]
struct PuppetEntry {
    json: String,
    #[serde(default)]
    textures: Vec<TextureEntry>,
}

/// A solid-colour texture.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct TextureEntry {
    pub width: u32,
    pub height: u32,
    pub rgba: [u8; 4],
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn read_to_string(rel: &str) -> Result<String> {
    let path = resolve_path(rel);
    fs::read_to_string(&path)
        .with_context(|| format!("failed to read fixture at {}", path.display()))
}

fn lookup<'a, T>(map: &'a HashMap<String, T>, kind: &str, name: &str) -> Result<&'a T> {
    map.get(name)
        .ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
}

/// PNG-encode a `width` x `height` image filled with `rgba`.
pub fn solid_png(width: u32, height: u32, rgba: [u8; 4]) -> Result<Vec<u8>> {
    let img = RgbaImage::from_pixel(width, height, Rgba(rgba));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .context("failed to encode fixture texture")?;
    Ok(out.into_inner())
}

/// Pack `json` and PNG `textures` into an INP container.
pub fn build_inp(json: &str, textures: &[Vec<u8>]) -> Vec<u8> {
    write_inp(&InpFile {
        json: json.to_string(),
        textures: textures
            .iter()
            .map(|data| InpTexture {
                encoding: TextureEncoding::Png,
                data: data.clone(),
            })
            .collect(),
        extensions: Vec::new(),
    })
}

pub mod puppets {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.puppets.keys().cloned().collect()
    }

    pub fn json(name: &str) -> Result<String> {
        let entry = lookup(&MANIFEST.puppets, "puppet", name)?;
        read_to_string(&entry.json)
    }

    /// Texture descriptions in file order.
    pub fn textures(name: &str) -> Result<Vec<TextureEntry>> {
        let entry = lookup(&MANIFEST.puppets, "puppet", name)?;
        Ok(entry.textures.clone())
    }

    /// The puppet as an in-memory INP file.
    pub fn inp_bytes(name: &str) -> Result<Vec<u8>> {
        let json = json(name)?;
        let pngs = textures(name)?
            .iter()
            .map(|t| solid_png(t.width, t.height, t.rgba))
            .collect::<Result<Vec<_>>>()?;
        Ok(build_inp(&json, &pngs))
    }

    /// Write the puppet to a fresh temp file and return its path.
    pub fn inp_path(name: &str) -> Result<PathBuf> {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        let dir = std::env::temp_dir().join(format!("inochi2d-fixtures-{}", std::process::id()));
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        let path = dir.join(format!("{name}-{}.inp", NEXT.fetch_add(1, Ordering::Relaxed)));
        fs::write(&path, inp_bytes(name)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}

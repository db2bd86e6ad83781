//! Thumbnail discovery for content directories.

use std::{fs::File, io::Read, path::Path};

use image::ImageFormat;

pub const THUMBNAIL_PREFIX: &str = "_thumbnail.";

/// Number of leading bytes inspected when sniffing a file.
const SNIFF_LEN: usize = 512;

/// Windows cursor header, which `image::guess_format` does not know.
const CURSOR_MAGIC: &[u8] = b"\x00\x00\x02\x00";

/// MIME type of a BMP, GIF, PNG, JPEG, WEBP or ICO/CUR image, judged from
/// its leading bytes.
pub fn sniff_image_mime(head: &[u8]) -> Option<&'static str> {
    if head.starts_with(CURSOR_MAGIC) {
        return Some(ImageFormat::Ico.to_mime_type());
    }

    match image::guess_format(head).ok()? {
        format @ (ImageFormat::Bmp
        | ImageFormat::Gif
        | ImageFormat::Png
        | ImageFormat::Jpeg
        | ImageFormat::WebP
        | ImageFormat::Ico) => Some(format.to_mime_type()),
        _ => None,
    }
}

fn is_image_file(path: &Path) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };

    let mut head = Vec::with_capacity(SNIFF_LEN);
    if file.take(SNIFF_LEN as u64).read_to_end(&mut head).is_err() {
        return false;
    }

    sniff_image_mime(&head).is_some()
}

/// File name of the first `_thumbnail.*` image in `dir`, by name order.
pub fn find_thumbnail(dir: &Path) -> Option<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(THUMBNAIL_PREFIX))
        .collect();
    names.sort();

    names.into_iter().find(|name| {
        let found = is_image_file(&dir.join(name));
        if !found {
            log::debug!("{} is not an image, ignored", dir.join(name).display());
        }
        found
    })
}

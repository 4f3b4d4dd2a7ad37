//! Image file discovery from `dir` output.

use crate::error::IosupError;

/// An image file in the primary filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub name: String,
    pub size: Option<u64>,
}

/// Primary filesystem and the `.bin` files found in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryListing {
    /// Filesystem prefix including the colon, e.g. `bootflash:`.
    pub filesystem: String,
    pub images: Vec<ImageFile>,
}

impl DirectoryListing {
    /// Boot path for an image: filesystem prefix followed by the file name.
    pub fn boot_path(&self, image: &ImageFile) -> String {
        format!("{}{}", self.filesystem, image.name)
    }

    /// Look up an image by file name, with or without the filesystem prefix.
    pub fn find(&self, name: &str) -> Option<&ImageFile> {
        let name = name.trim();
        let name = name.strip_prefix(&self.filesystem).unwrap_or(name);
        let name = name.trim_start_matches('/');
        self.images.iter().find(|i| i.name == name)
    }
}

/// Parse `dir` output.
///
/// The filesystem is the first `<name>:/` token; every token ending in `.bin`
/// is an image, listed once in device order.
pub fn parse_directory_listing(output: &str) -> Result<DirectoryListing, IosupError> {
    let filesystem = output
        .split_whitespace()
        .find(|t| t.ends_with(":/"))
        .map(|t| t.trim_end_matches('/').to_string())
        .ok_or(IosupError::InvalidListing)?;

    let mut images: Vec<ImageFile> = Vec::new();
    for line in output.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(name) = tokens.iter().find(|t| is_image_name(t)) else {
            continue;
        };
        if images.iter().any(|i| i.name == *name) {
            continue;
        }
        images.push(ImageFile {
            name: name.to_string(),
            size: entry_size(&tokens),
        });
    }

    if images.is_empty() {
        return Err(IosupError::NoImagesFound(filesystem));
    }

    Ok(DirectoryListing { filesystem, images })
}

fn is_image_name(token: &str) -> bool {
    token.len() > ".bin".len() && token.ends_with(".bin") && !token.contains(':')
}

/// Size column of a `dir` entry (`<index> <perms> <size> ...`).
fn entry_size(tokens: &[&str]) -> Option<u64> {
    match tokens {
        [index, perms, size, ..] if index.parse::<u32>().is_ok() && perms.starts_with('-') => {
            size.parse().ok()
        }
        _ => None,
    }
}

/// Human-readable size, e.g. `412.5 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIR_OUTPUT: &str = "\
Directory of bootflash:/

    1  -rw-   123456789  Aug 24 2016 10:12:06 +00:00  cat4500e-universalk9.SPA.03.06.04.E.152-2.E4.bin
    2  -rw-   132451420  Oct  1 2026 09:01:44 +00:00  cat4500e-universalk9.SPA.03.11.03.E.152-7.E3.bin
    3  -rw-        2048  Oct  1 2026 09:05:10 +00:00  vlan.dat
    4  drwx        4096  Jan  3 2016 12:00:00 +00:00  tracelogs

1024000000 bytes total (512000000 bytes free)";

    #[test]
    fn test_parse_filesystem_and_images() {
        let listing = parse_directory_listing(DIR_OUTPUT).unwrap();

        assert_eq!(listing.filesystem, "bootflash:");
        assert_eq!(listing.images.len(), 2);
        assert_eq!(
            listing.images[1].name,
            "cat4500e-universalk9.SPA.03.11.03.E.152-7.E3.bin"
        );
        assert_eq!(listing.images[1].size, Some(132451420));
    }

    #[test]
    fn test_boot_path_is_filesystem_plus_file() {
        let listing = parse_directory_listing(DIR_OUTPUT).unwrap();
        assert_eq!(
            listing.boot_path(&listing.images[0]),
            "bootflash:cat4500e-universalk9.SPA.03.06.04.E.152-2.E4.bin"
        );
    }

    #[test]
    fn test_find_with_or_without_prefix() {
        let listing = parse_directory_listing(DIR_OUTPUT).unwrap();
        let name = "cat4500e-universalk9.SPA.03.11.03.E.152-7.E3.bin";

        assert!(listing.find(name).is_some());
        assert!(listing.find(&format!("bootflash:{}", name)).is_some());
        assert!(listing.find(&format!("bootflash:/{}", name)).is_some());
        assert!(listing.find("missing.bin").is_none());
    }

    #[test]
    fn test_duplicate_names_listed_once() {
        let output = format!(
            "{}\n    5  -rw-   123456789  Aug 24 2016 10:12:06 +00:00  cat4500e-universalk9.SPA.03.06.04.E.152-2.E4.bin",
            DIR_OUTPUT
        );
        let listing = parse_directory_listing(&output).unwrap();
        assert_eq!(listing.images.len(), 2);
    }

    #[test]
    fn test_no_filesystem() {
        let err = parse_directory_listing("% Invalid input detected at '^' marker.").unwrap_err();
        assert!(matches!(err, IosupError::InvalidListing));
    }

    #[test]
    fn test_no_images() {
        let output = "Directory of slot0:/\n\n    1  -rw-   2048  Oct  1 2026 09:05:10 +00:00  vlan.dat";
        let err = parse_directory_listing(output).unwrap_err();
        assert_eq!(err.to_string(), "No .bin image files found on slot0:");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(132451420), "126.3 MB");
    }
}

//! Text-protocol plumbing for the driver's control tree
//!
//! Everything the driver exposes is a regular-looking file under the control
//! root: two write-only control files (`setup`/`unsetup`) and one directory
//! of attribute files per element. Requests are written whole and pushed to
//! stable storage before the file is closed, so the driver never observes a
//! partial request.
//!
//! Attribute files have a quirk: the directory appears as soon as the driver
//! creates the element, but the udev permission rule that makes the files
//! accessible runs asynchronously. Opens therefore retry `ENOENT`/`EACCES`
//! for a bounded window. That window is the only tolerance for asynchronous
//! external state anywhere in this crate; every other failure surfaces
//! immediately.
use crate::error::{ElementError, Result};
use log::debug;
use std::{
    fs::{File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    os::unix::io::AsRawFd,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

/// How long to wait for the udev permission rule to kick in.
const ATTR_TIMEOUT: Duration = Duration::from_millis(2000);
const RETRY_SLEEP: Duration = Duration::from_millis(1);

/// The driver pads text attributes with trailing whitespace/newline.
const TEXT_SEPARATORS: &[u8] = b" \n\t";

/// Attribute file names under `<root>/elements/<name>/`.
pub(crate) mod attr {
    pub const TYPE: &str = "type";
    pub const DIRECTION: &str = "direction";
    pub const PIN: &str = "pin";
    pub const PIN_NAME: &str = "pin_name";
    pub const PIN_PULL: &str = "pin_pull";
    pub const PIN_B: &str = "pin_b";
    pub const PIN_B_NAME: &str = "pin_b_name";
    pub const PIN_B_PULL: &str = "pin_b_pull";
    pub const INPUT_MIN: &str = "input_min";
    pub const INPUT_MAX: &str = "input_max";
    pub const VALUE_LOW: &str = "value_low";
    pub const VALUE_HIGH: &str = "value_high";
    pub const VALUE_MODE: &str = "value_mode";
    pub const VALUE: &str = "value";
    pub const ACTIVITY_TYPE: &str = "activity_type";
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum ControlFile {
    Setup,
    Unsetup,
}

pub(crate) fn control_path(root: &Path, file: ControlFile) -> PathBuf {
    root.join(match file {
        ControlFile::Setup => "setup",
        ControlFile::Unsetup => "unsetup",
    })
}

pub(crate) fn element_dir(root: &Path, name: &str) -> PathBuf {
    root.join("elements").join(name)
}

pub(crate) fn attr_path(root: &Path, name: &str, attr: &str) -> PathBuf {
    element_dir(root, name).join(attr)
}

/// Opens a control file for writing. No retry; the control files exist as
/// soon as the driver is loaded.
pub(crate) fn open_control(root: &Path, file: ControlFile) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .open(control_path(root, file))
        .map_err(Into::into)
}

/// Opens an element attribute file, retrying `ENOENT`/`EACCES` for up to
/// [`ATTR_TIMEOUT`] to absorb the window between the driver creating the
/// directory and udev applying the permission rule.
pub(crate) fn open_attr(
    root: &Path,
    name: &str,
    attr: &'static str,
    opts: &OpenOptions,
) -> Result<File> {
    let path = attr_path(root, name, attr);
    let started = Instant::now();
    loop {
        match opts.open(&path) {
            Ok(file) => return Ok(file),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
                ) =>
            {
                if started.elapsed() >= ATTR_TIMEOUT {
                    debug!("giving up on {}: {}", path.display(), e);
                    return Err(ElementError::Timeout { attr, source: e });
                }
                thread::sleep(RETRY_SLEEP);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

pub(crate) fn fdatasync(file: &File) -> io::Result<()> {
    nix::unistd::fdatasync(file.as_raw_fd())
        .map_err(|e| io::Error::from_raw_os_error(e as i32))
}

/// Writes a complete request and forces it to stable storage, so the
/// control-file consumer never sees a partial write.
pub(crate) fn write_request(file: &mut File, request: &str) -> io::Result<()> {
    file.write_all(request.as_bytes())?;
    fdatasync(file)
}

fn parse_int(bytes: &[u8]) -> Result<i32> {
    let end = bytes
        .iter()
        .position(|b| TEXT_SEPARATORS.contains(b))
        .unwrap_or(bytes.len());
    let s = std::str::from_utf8(&bytes[..end])
        .map_err(|_| ElementError::Parse(String::from_utf8_lossy(bytes).into_owned()))?;
    s.parse().map_err(|_| ElementError::Parse(s.into()))
}

/// Reads a decimal value through an already-open attribute descriptor.
/// Rewinds first, so the same descriptor can be polled repeatedly.
pub(crate) fn read_value(mut file: &File) -> Result<i32> {
    file.seek(SeekFrom::Start(0))?;
    let mut buf = [0u8; 16];
    let n = file.read(&mut buf)?;
    parse_int(&buf[..n])
}

/// Writes a decimal value through an already-open attribute descriptor,
/// with the same durability barrier as the control files.
pub(crate) fn write_value(mut file: &File, value: i32) -> Result<()> {
    file.seek(SeekFrom::Start(0))?;
    file.write_all(value.to_string().as_bytes())?;
    fdatasync(file)?;
    Ok(())
}

pub(crate) fn read_attr_str(root: &Path, name: &str, attr: &'static str) -> Result<String> {
    let mut file = open_attr(root, name, attr, OpenOptions::new().read(true))?;
    let mut buf = [0u8; 64];
    let n = file.read(&mut buf)?;
    let raw = &buf[..n];
    let end = raw
        .iter()
        .position(|b| TEXT_SEPARATORS.contains(b))
        .unwrap_or(raw.len());
    String::from_utf8(raw[..end].to_vec())
        .map_err(|_| ElementError::Parse(String::from_utf8_lossy(raw).into_owned()))
}

pub(crate) fn read_attr_int(root: &Path, name: &str, attr: &'static str) -> Result<i32> {
    let file = open_attr(root, name, attr, OpenOptions::new().read(true))?;
    read_value(&file)
}

pub(crate) fn write_attr_int(
    root: &Path,
    name: &str,
    attr: &'static str,
    value: i32,
) -> Result<()> {
    let file = open_attr(root, name, attr, OpenOptions::new().write(true))?;
    write_value(&file, value)
}

pub(crate) fn write_attr_str(
    root: &Path,
    name: &str,
    attr: &'static str,
    value: &str,
) -> Result<()> {
    let mut file = open_attr(root, name, attr, OpenOptions::new().write(true))?;
    write_request(&mut file, value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn paths() {
        let root = Path::new("/sys/pisound-micro");
        assert_eq!(
            control_path(root, ControlFile::Setup),
            Path::new("/sys/pisound-micro/setup")
        );
        assert_eq!(
            control_path(root, ControlFile::Unsetup),
            Path::new("/sys/pisound-micro/unsetup")
        );
        assert_eq!(
            attr_path(root, "enc1", attr::VALUE),
            Path::new("/sys/pisound-micro/elements/enc1/value")
        );
    }

    #[test]
    fn value_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("value");
        fs::write(&path, "").unwrap();
        let file = OpenOptions::new().read(true).write(true).open(&path).unwrap();
        write_value(&file, -123).unwrap();
        assert_eq!(read_value(&file).unwrap(), -123);
    }

    #[test]
    fn int_parsing_stops_at_whitespace() {
        assert_eq!(parse_int(b"42\n").unwrap(), 42);
        assert_eq!(parse_int(b"7 trailing").unwrap(), 7);
        assert!(parse_int(b"x42").is_err());
    }

    #[test]
    fn attr_string_truncated_at_whitespace() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("elements/e1")).unwrap();
        fs::write(dir.path().join("elements/e1/type"), "gpio\n").unwrap();
        assert_eq!(read_attr_str(dir.path(), "e1", attr::TYPE).unwrap(), "gpio");
    }

    #[test]
    fn open_attr_fails_fast_on_other_errors() {
        let dir = TempDir::new().unwrap();
        // elements/<name> is a file, so the path below it is ENOTDIR, which
        // must not be retried.
        fs::create_dir_all(dir.path().join("elements")).unwrap();
        fs::write(dir.path().join("elements/e1"), "").unwrap();
        let started = Instant::now();
        let err = open_attr(dir.path(), "e1", attr::VALUE, OpenOptions::new().read(true))
            .unwrap_err();
        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(matches!(err, ElementError::Io(_)));
    }
}

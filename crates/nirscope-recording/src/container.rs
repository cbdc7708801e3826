//! Hierarchical binary container codec
//!
//! A recording container is a tree of named groups holding typed datasets,
//! serialized big-endian. The file starts with a 4-byte magic and a format
//! version, followed by the root group node. Every node carries a one-byte
//! tag, a length-prefixed UTF-8 name, and a tag-specific payload.
//!
//! Wire layout:
//!
//! ```text
//! header  := magic "NRC1" | version u16
//! node    := tag u8 | name_len u16 | name bytes | payload
//! group   := child_count u32 | node*
//! f64vec  := len u32 | f64*
//! f64mat  := rows u32 | cols u32 | f64*          (row-major)
//! i32vec  := len u32 | i32*
//! text    := byte_len u32 | utf-8 bytes
//! ```

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

const MAGIC: [u8; 4] = *b"NRC1";
const FORMAT_VERSION: u16 = 1;

const TAG_GROUP: u8 = 1;
const TAG_F64_VECTOR: u8 = 2;
const TAG_F64_MATRIX: u8 = 3;
const TAG_I32_VECTOR: u8 = 4;
const TAG_TEXT: u8 = 5;

// ============================================================================
// Errors
// ============================================================================

/// Errors produced while encoding or decoding a container file.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// The file does not start with the container magic.
    #[error("not a recording container (bad magic)")]
    BadMagic,

    /// The container was written by an unknown format revision.
    #[error("unsupported container version {0}")]
    UnsupportedVersion(u16),

    /// The top-level node is a dataset instead of a group.
    #[error("container root is not a group")]
    RootNotGroup,

    /// A node carried a tag byte outside the known set.
    #[error("unknown node tag {0}")]
    UnknownNodeTag(u8),

    /// A name or text payload was not valid UTF-8.
    #[error("invalid utf-8 in container string")]
    InvalidUtf8,

    /// A node name is too long for the format's 16-bit length field.
    #[error("node name of {0} bytes exceeds the format limit")]
    NameTooLong(usize),

    /// The underlying read or write failed.
    #[error("container i/o error")]
    Io(#[from] io::Error),
}

// ============================================================================
// Tree model
// ============================================================================

/// A typed leaf value stored under a name inside a [`Group`].
#[derive(Clone, Debug, PartialEq)]
pub enum Dataset {
    /// One-dimensional series of f64 samples.
    F64Vector(Vec<f64>),
    /// Row-major two-dimensional f64 array.
    F64Matrix {
        /// Number of rows.
        rows: usize,
        /// Number of columns.
        cols: usize,
        /// `rows * cols` values, row-major.
        values: Vec<f64>,
    },
    /// One-dimensional series of i32 values.
    I32Vector(Vec<i32>),
    /// UTF-8 string payload.
    Text(String),
}

impl Dataset {
    /// Borrow the samples if this is an f64 vector.
    #[must_use]
    pub fn as_f64_vector(&self) -> Option<&[f64]> {
        match self {
            Self::F64Vector(values) => Some(values),
            _ => None,
        }
    }

    /// Borrow shape and values if this is an f64 matrix.
    #[must_use]
    pub fn as_f64_matrix(&self) -> Option<(usize, usize, &[f64])> {
        match self {
            Self::F64Matrix { rows, cols, values } => Some((*rows, *cols, values)),
            _ => None,
        }
    }

    /// Borrow the values if this is an i32 vector.
    #[must_use]
    pub fn as_i32_vector(&self) -> Option<&[i32]> {
        match self {
            Self::I32Vector(values) => Some(values),
            _ => None,
        }
    }

    /// Borrow the string if this is a text dataset.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// A named interior node holding child groups and datasets.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Group {
    name: String,
    groups: Vec<Group>,
    datasets: Vec<(String, Dataset)>,
}

impl Group {
    /// Create an empty group.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: Vec::new(),
            datasets: Vec::new(),
        }
    }

    /// The group's own name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a child group.
    pub fn add_group(&mut self, group: Group) {
        self.groups.push(group);
    }

    /// Append a named dataset.
    pub fn add_dataset(&mut self, name: impl Into<String>, dataset: Dataset) {
        self.datasets.push((name.into(), dataset));
    }

    /// Look up a direct child group by name.
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Look up a direct dataset by name.
    #[must_use]
    pub fn dataset(&self, name: &str) -> Option<&Dataset> {
        self.datasets
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d)
    }

    /// Iterate over this group's datasets in file order.
    pub fn datasets(&self) -> impl Iterator<Item = (&str, &Dataset)> {
        self.datasets.iter().map(|(n, d)| (n.as_str(), d))
    }

    // ------------------------------------------------------------------------
    // Decoding
    // ------------------------------------------------------------------------

    /// Read a container file and return its root group.
    ///
    /// # Errors
    ///
    /// Fails on i/o problems, a bad magic or version, unknown node tags, or
    /// invalid UTF-8 in names and text payloads.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ContainerError> {
        let mut reader = BufReader::new(File::open(path)?);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(ContainerError::BadMagic);
        }
        let version = reader.read_u16::<BigEndian>()?;
        if version != FORMAT_VERSION {
            return Err(ContainerError::UnsupportedVersion(version));
        }

        match read_node(&mut reader)? {
            Node::Group(root) => Ok(root),
            Node::Dataset(..) => Err(ContainerError::RootNotGroup),
        }
    }

    // ------------------------------------------------------------------------
    // Encoding
    // ------------------------------------------------------------------------

    /// Serialize this group as a container file at `path`.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be created or written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ContainerError> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&MAGIC)?;
        writer.write_u16::<BigEndian>(FORMAT_VERSION)?;
        write_group(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

enum Node {
    Group(Group),
    Dataset(String, Dataset),
}

fn read_string<R: Read>(reader: &mut R, len: usize) -> Result<String, ContainerError> {
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|_| ContainerError::InvalidUtf8)
}

fn read_node<R: Read>(reader: &mut R) -> Result<Node, ContainerError> {
    let tag = reader.read_u8()?;
    let name_len = reader.read_u16::<BigEndian>()? as usize;
    let name = read_string(reader, name_len)?;

    match tag {
        TAG_GROUP => {
            let child_count = reader.read_u32::<BigEndian>()? as usize;
            let mut group = Group::new(name);
            for _ in 0..child_count {
                match read_node(reader)? {
                    Node::Group(child) => group.groups.push(child),
                    Node::Dataset(child_name, dataset) => {
                        group.datasets.push((child_name, dataset));
                    }
                }
            }
            Ok(Node::Group(group))
        }
        TAG_F64_VECTOR => {
            let len = reader.read_u32::<BigEndian>()? as usize;
            let mut values = vec![0.0; len];
            reader.read_f64_into::<BigEndian>(&mut values)?;
            Ok(Node::Dataset(name, Dataset::F64Vector(values)))
        }
        TAG_F64_MATRIX => {
            let rows = reader.read_u32::<BigEndian>()? as usize;
            let cols = reader.read_u32::<BigEndian>()? as usize;
            let mut values = vec![0.0; rows * cols];
            reader.read_f64_into::<BigEndian>(&mut values)?;
            Ok(Node::Dataset(name, Dataset::F64Matrix { rows, cols, values }))
        }
        TAG_I32_VECTOR => {
            let len = reader.read_u32::<BigEndian>()? as usize;
            let mut values = vec![0; len];
            reader.read_i32_into::<BigEndian>(&mut values)?;
            Ok(Node::Dataset(name, Dataset::I32Vector(values)))
        }
        TAG_TEXT => {
            let len = reader.read_u32::<BigEndian>()? as usize;
            let text = read_string(reader, len)?;
            Ok(Node::Dataset(name, Dataset::Text(text)))
        }
        other => Err(ContainerError::UnknownNodeTag(other)),
    }
}

fn write_name<W: Write>(writer: &mut W, tag: u8, name: &str) -> Result<(), ContainerError> {
    let len =
        u16::try_from(name.len()).map_err(|_| ContainerError::NameTooLong(name.len()))?;
    writer.write_u8(tag)?;
    writer.write_u16::<BigEndian>(len)?;
    writer.write_all(name.as_bytes())?;
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn write_group<W: Write>(writer: &mut W, group: &Group) -> Result<(), ContainerError> {
    write_name(writer, TAG_GROUP, &group.name)?;
    writer.write_u32::<BigEndian>((group.groups.len() + group.datasets.len()) as u32)?;
    for (name, dataset) in &group.datasets {
        write_dataset(writer, name, dataset)?;
    }
    for child in &group.groups {
        write_group(writer, child)?;
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn write_dataset<W: Write>(
    writer: &mut W,
    name: &str,
    dataset: &Dataset,
) -> Result<(), ContainerError> {
    match dataset {
        Dataset::F64Vector(values) => {
            write_name(writer, TAG_F64_VECTOR, name)?;
            writer.write_u32::<BigEndian>(values.len() as u32)?;
            for &v in values {
                writer.write_f64::<BigEndian>(v)?;
            }
        }
        Dataset::F64Matrix { rows, cols, values } => {
            write_name(writer, TAG_F64_MATRIX, name)?;
            writer.write_u32::<BigEndian>(*rows as u32)?;
            writer.write_u32::<BigEndian>(*cols as u32)?;
            for &v in values {
                writer.write_f64::<BigEndian>(v)?;
            }
        }
        Dataset::I32Vector(values) => {
            write_name(writer, TAG_I32_VECTOR, name)?;
            writer.write_u32::<BigEndian>(values.len() as u32)?;
            for &v in values {
                writer.write_i32::<BigEndian>(v)?;
            }
        }
        Dataset::Text(text) => {
            write_name(writer, TAG_TEXT, name)?;
            writer.write_u32::<BigEndian>(text.len() as u32)?;
            writer.write_all(text.as_bytes())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn sample_tree() -> Group {
        let mut probe = Group::new("probe");
        probe.add_dataset("wavelengths", Dataset::I32Vector(vec![760, 850]));
        probe.add_dataset(
            "sourcePos2D",
            Dataset::F64Matrix {
                rows: 2,
                cols: 2,
                values: vec![0.0, 0.0, 1.0, 0.5],
            },
        );

        let mut meta = Group::new("metaDataTags");
        meta.add_dataset("SubjectID", Dataset::Text("subj-01".into()));

        let mut root = Group::new("nirs");
        root.add_dataset("time", Dataset::F64Vector(vec![0.0, 0.1, 0.2]));
        root.add_group(meta);
        root.add_group(probe);
        root
    }

    #[test]
    fn test_save_open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.nrc");

        let tree = sample_tree();
        tree.save(&path).unwrap();
        let loaded = Group::open(&path).unwrap();

        assert_eq!(loaded, tree);
        assert_eq!(
            loaded
                .group("metaDataTags")
                .and_then(|g| g.dataset("SubjectID"))
                .and_then(Dataset::as_text),
            Some("subj-01")
        );
        let (rows, cols, values) = loaded
            .group("probe")
            .and_then(|g| g.dataset("sourcePos2D"))
            .and_then(Dataset::as_f64_matrix)
            .unwrap();
        assert_eq!((rows, cols), (2, 2));
        assert_eq!(values, &[0.0, 0.0, 1.0, 0.5]);
    }

    #[test]
    fn test_open_rejects_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bogus.nrc");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"HDF5....")
            .unwrap();

        assert!(matches!(Group::open(&path), Err(ContainerError::BadMagic)));
    }

    #[test]
    fn test_open_rejects_future_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.nrc");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&MAGIC).unwrap();
        file.write_all(&99u16.to_be_bytes()).unwrap();

        assert!(matches!(
            Group::open(&path),
            Err(ContainerError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn test_open_rejects_truncated_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.nrc");

        sample_tree().save(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

        assert!(matches!(Group::open(&path), Err(ContainerError::Io(_))));
    }

    #[test]
    fn test_open_rejects_dataset_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flat.nrc");

        // Valid header followed by a bare dataset where the root group
        // should be
        let mut writer = std::io::BufWriter::new(std::fs::File::create(&path).unwrap());
        writer.write_all(&MAGIC).unwrap();
        writer.write_all(&FORMAT_VERSION.to_be_bytes()).unwrap();
        write_dataset(&mut writer, "time", &Dataset::F64Vector(vec![0.0, 0.1])).unwrap();
        writer.flush().unwrap();

        assert!(matches!(
            Group::open(&path),
            Err(ContainerError::RootNotGroup)
        ));
    }

    #[test]
    fn test_save_rejects_overlong_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.nrc");

        let name = "n".repeat(usize::from(u16::MAX) + 1);
        let mut root = Group::new("nirs");
        root.add_dataset(name, Dataset::I32Vector(vec![1]));

        assert!(matches!(
            root.save(&path),
            Err(ContainerError::NameTooLong(len)) if len == usize::from(u16::MAX) + 1
        ));
    }

    #[test]
    fn test_dataset_accessors_are_type_checked() {
        let text = Dataset::Text("HbO".into());
        assert!(text.as_f64_vector().is_none());
        assert!(text.as_i32_vector().is_none());
        assert_eq!(text.as_text(), Some("HbO"));
    }
}

//! Reading and writing `QWick` files.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{self, format_err};
use bincode;
use serde::{de::DeserializeOwned, Serialize};
use serde_yaml;

pub(crate) mod format;


/// An enumerated type for `QWick` file types.
pub enum QWickFileType {
    /// Variant for binary files containing simplified expressions.
    Expr,
}

impl QWickFileType {
    /// Returns the extension of the file type.
    pub fn ext(&self) -> String {
        match self {
            QWickFileType::Expr => "qwick.expr".to_string(),
        }
    }

    /// Returns the path of a file of this type with the given stem.
    fn path<P: AsRef<Path>>(&self, name: P) -> PathBuf {
        name.as_ref().with_extension(self.ext())
    }
}

/// Reads a `QWick` binary file and deserialises it into an appropriate structure.
///
/// # Arguments
///
/// * `name` - The name of the file to be read in (without `QWick`-specific extensions).
/// * `file_type` - The type of the `QWick` file to be read in.
///
/// # Returns
///
/// A `Result` containing the structure deserialised from the read-in file.
pub fn read_qwick_binary<T, P: AsRef<Path>>(
    name: P,
    file_type: QWickFileType,
) -> Result<T, anyhow::Error>
where
    T: DeserializeOwned,
{
    let path = file_type.path(name);
    let file = File::open(&path)
        .map_err(|err| format_err!("Unable to open `{}`: {err}", path.display()))?;
    bincode::deserialize_from(BufReader::new(file)).map_err(|err| format_err!(err))
}

/// Serialises a structure and writes into a `QWick` binary file.
///
/// # Arguments
///
/// * `name` - The name of the file to be written (without `QWick`-specific extensions).
/// * `file_type` - The type of the `QWick` file to be written.
///
/// # Returns
///
/// A `Result` indicating if the serialisation and writing processes have been successful.
pub fn write_qwick_binary<T, P: AsRef<Path>>(
    name: P,
    file_type: QWickFileType,
    value: &T,
) -> Result<(), anyhow::Error>
where
    T: Serialize,
{
    let path = file_type.path(name);
    let file = File::create(&path)
        .map_err(|err| format_err!("Unable to create `{}`: {err}", path.display()))?;
    bincode::serialize_into(BufWriter::new(file), value).map_err(|err| format_err!(err))
}

/// Reads a `QWick` YAML input file and deserialises it into an appropriate structure.
///
/// # Arguments
///
/// * `name` - The name of the file to be read in (with its `.yml` or `.yaml` extension).
///
/// # Returns
///
/// A `Result` containing the structure deserialised from the read-in file.
pub fn read_qwick_yaml<T, P: AsRef<Path>>(name: P) -> Result<T, anyhow::Error>
where
    T: DeserializeOwned,
{
    let file = File::open(name.as_ref())
        .map_err(|err| format_err!("Unable to open `{}`: {err}", name.as_ref().display()))?;
    serde_yaml::from_reader(BufReader::new(file)).map_err(|err| format_err!(err))
}

/// Serialises a structure and writes into a `QWick` YAML file.
///
/// # Arguments
///
/// * `name` - The name of the YAML file to be written (without extensions). The resulting file
/// will have the `.yml` extension.
///
/// # Returns
///
/// A `Result` indicating if the serialisation and writing processes have been successful.
pub fn write_qwick_yaml<T, P: AsRef<Path>>(name: P, value: &T) -> Result<(), anyhow::Error>
where
    T: Serialize,
{
    let path = name.as_ref().with_extension("yml");
    let file = File::create(&path)
        .map_err(|err| format_err!("Unable to create `{}`: {err}", path.display()))?;
    serde_yaml::to_writer(BufWriter::new(file), value).map_err(|err| format_err!(err))
}

//! Saving to and loading from files.
use serde::{de::DeserializeOwned, Serialize};
use serde_cbor::ser::IoWrite;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Serialize to an opaque binary file or load from one.
pub trait SaveLoad {
    type SaveErr;
    type LoadErr;

    /// Serialize to a file.
    fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Self::SaveErr>;

    /// Load from a file created by [`SaveLoad::save`].
    fn load<P: AsRef<Path>>(path: P) -> Result<Self, Self::LoadErr>
    where
        Self: Sized;
}

#[derive(Debug, Error)]
pub enum SerdeSaveLoadError {
    #[error("file error {0}")]
    Io(#[from] std::io::Error),
    #[error("(de)serialization error {0}")]
    Cbor(#[from] serde_cbor::Error),
    #[error("json (de)serialization error {0}")]
    Json(#[from] serde_json::Error),
}

impl<T: Serialize + DeserializeOwned> SaveLoad for T {
    type SaveErr = SerdeSaveLoadError;
    type LoadErr = SerdeSaveLoadError;

    fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Self::SaveErr> {
        save_cbor(self, path)
    }

    fn load<P: AsRef<Path>>(path: P) -> Result<Self, Self::LoadErr>
    where
        Self: Sized,
    {
        let reader = BufReader::new(File::open(path)?);
        let this = serde_cbor::from_reader(reader)?;
        Ok(this)
    }
}

/// Write a value as CBOR.
///
/// Unlike [`SaveLoad::save`] this accepts unsized values such as slices.
pub fn save_cbor<T, P>(value: &T, path: P) -> Result<(), SerdeSaveLoadError>
where
    T: Serialize + ?Sized,
    P: AsRef<Path>,
{
    let mut writer = BufWriter::new(File::create(path)?);
    value.serialize(&mut serde_cbor::Serializer::new(IoWrite::new(&mut writer)))?;
    writer.flush()?;
    Ok(())
}

/// Write a value as pretty-printed JSON.
pub fn save_json<T, P>(value: &T, path: P) -> Result<(), SerdeSaveLoadError>
where
    T: Serialize + ?Sized,
    P: AsRef<Path>,
{
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Read a value from a JSON file.
pub fn load_json<T, P>(path: P) -> Result<T, SerdeSaveLoadError>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::env;
    use std::fs;
    use std::process;

    #[test]
    fn cbor_slice_loads_as_vec() {
        let path = env::temp_dir().join(format!("save-cbor-{}.cbor", process::id()));
        let values = [1.5, -2.0, 3.25];
        save_cbor(&values[..], &path).unwrap();
        assert_eq!(Vec::<f64>::load(&path).unwrap(), values);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn json_round_trip() {
        let path = env::temp_dir().join(format!("save-json-{}.json", process::id()));
        let value: BTreeMap<String, Vec<i8>> = [("actions".to_string(), vec![-1, 0, 1])]
            .into_iter()
            .collect();
        save_json(&value, &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(load_json::<BTreeMap<String, Vec<i8>>, _>(&path).unwrap(), value);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_file_is_io_error() {
        let path = env::temp_dir().join("save-load-missing-file.cbor");
        assert!(matches!(
            Vec::<f64>::load(path),
            Err(SerdeSaveLoadError::Io(_))
        ));
    }
}

//! # 证书日志读取
//!
//! 按行读取一天的证书日志，用于离线导出和对账。遇到无法解析的行立即报错并结束迭代。

use crate::error::StorageError;
use crate::record::StorageRecord;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::iter::FusedIterator;
use std::path::Path;

/// 证书日志迭代器
///
/// 只能向前读取一遍；需要重新读取时创建新的迭代器。
pub struct StoredRecordIterator {
    lines: Lines<BufReader<File>>,
    line_number: usize,
    finished: bool,
}

impl StoredRecordIterator {
    /// 打开日志文件
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| StorageError::Io(format!("打开证书日志 {} 失败: {}", path.display(), e)))?;

        Ok(Self {
            lines: BufReader::new(file).lines(),
            line_number: 0,
            finished: false,
        })
    }

    /// 已读取的行数
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

impl Iterator for StoredRecordIterator {
    type Item = Result<StorageRecord, StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let line = match self.lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                self.finished = true;
                return Some(Err(StorageError::Io(format!("读取证书日志失败: {}", e))));
            }
            None => {
                self.finished = true;
                return None;
            }
        };
        self.line_number += 1;

        match serde_json::from_str::<StorageRecord>(&line) {
            Ok(record) => Some(Ok(record)),
            Err(e) => {
                self.finished = true;
                Some(Err(StorageError::MalformedRecord {
                    line: self.line_number,
                    msg: e.to_string(),
                }))
            }
        }
    }
}

impl FusedIterator for StoredRecordIterator {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const LINE: &str = r#"{"it":"2026-10-15T14:22:01","et":"2028-10-14T14:22:01","serial":"ff","id":"x","cert":"AA=="}"#;

    #[test]
    fn test_reads_in_file_order() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("certStore-2026-10-15");
        let second = LINE.replace("\"ff\"", "\"100\"");
        fs::write(&path, format!("{}\n{}\n", LINE, second)).unwrap();

        let mut iter = StoredRecordIterator::open(&path).unwrap();
        assert_eq!(iter.next().unwrap().unwrap().serial, "ff");
        assert_eq!(iter.next().unwrap().unwrap().serial, "100");
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());
        assert_eq!(iter.line_number(), 2);
    }

    #[test]
    fn test_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("certStore-2026-10-15");
        fs::write(&path, "").unwrap();
        assert_eq!(StoredRecordIterator::open(&path).unwrap().count(), 0);
    }

    #[test]
    fn test_malformed_line_stops_iteration() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("certStore-2026-10-15");
        fs::write(&path, format!("{}\n{{broken\n{}\n", LINE, LINE)).unwrap();

        let mut iter = StoredRecordIterator::open(&path).unwrap();
        assert!(iter.next().unwrap().is_ok());
        match iter.next() {
            Some(Err(StorageError::MalformedRecord { line, .. })) => assert_eq!(line, 2),
            other => panic!("expected malformed record error, got {:?}", other),
        }
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            StoredRecordIterator::open(temp_dir.path().join("certStore-1999-01-01")),
            Err(StorageError::Io(_))
        ));
    }

    #[test]
    fn test_new_instance_restarts() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("certStore-2026-10-15");
        fs::write(&path, format!("{}\n", LINE)).unwrap();

        assert_eq!(StoredRecordIterator::open(&path).unwrap().count(), 1);
        assert_eq!(StoredRecordIterator::open(&path).unwrap().count(), 1);
    }
}

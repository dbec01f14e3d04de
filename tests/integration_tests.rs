//! 集成测试模块
//!
//! 从配置文件构建仓库，验证签发、吊销、状态查询和 CRL 编号的协同工作。

use ca_repo::{
    CertificateRepository, CertificateStatus, CrlMetadata, CrlMetadataProvider,
    HighVolumeRepository, RepositoryConfig, StatusLookup,
};
use ca_storage::{StorageCodec, StoredRecordIterator};
use chrono::{Local, TimeZone, Utc};
use num_bigint::BigUint;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

const LEAF1_DER: &[u8] = include_bytes!("../src/crates/ca-storage/tests/fixtures/leaf1.der");
const LEAF2_DER: &[u8] = include_bytes!("../src/crates/ca-storage/tests/fixtures/leaf2.der");
const LEAF3_DER: &[u8] = include_bytes!("../src/crates/ca-storage/tests/fixtures/leaf3.der");
const TEST_CRL: &[u8] = include_bytes!("../src/crates/ca-storage/tests/fixtures/test.crl.der");

fn config_for(dir: &Path, with_crypto: bool) -> RepositoryConfig {
    let mut content = format!(
        "log_level = \"debug\"\n\n[instances.sign-ca]\nstorage_directory = \"{}\"\n",
        dir.display()
    );
    if with_crypto {
        content.push_str(
            "\n[instances.sign-ca.crypto]\nkey = \"secret\"\nkid = \"key01\"\nsalt = \"c2FsdHNhbHQ=\"\niterations = 1000\n",
        );
    }
    RepositoryConfig::from_toml_str(&content).unwrap()
}

fn repository_for(dir: &Path, with_crypto: bool) -> HighVolumeRepository {
    let config = config_for(dir, with_crypto);
    HighVolumeRepository::from_instance_config("sign-ca", config.instance("sign-ca").unwrap())
        .unwrap()
}

/// 测试没有 CRL 文件时的编号分配
#[test]
fn test_crl_numbers_without_existing_crl() {
    println!("开始 CRL 编号测试");

    let temp_dir = TempDir::new().unwrap();
    let repository = repository_for(temp_dir.path(), false);

    assert_eq!(repository.current_crl_metadata().unwrap(), CrlMetadata::empty());
    assert_eq!(repository.next_crl_number(), BigUint::from(1u32));
    assert_eq!(repository.next_crl_number(), BigUint::from(2u32));

    println!("✅ CRL 编号测试通过");
}

/// 测试重启后从已发布的 CRL 恢复编号
#[test]
fn test_crl_number_restored_after_restart() {
    println!("开始 CRL 编号恢复测试");

    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("sign-ca.crl"), TEST_CRL).unwrap();

    let repository = repository_for(temp_dir.path(), false);
    assert_eq!(repository.current_crl_number(), BigUint::from(41u32));
    assert_eq!(repository.next_crl_number(), BigUint::from(42u32));

    // 新编号尚未发布，元数据仍是文件中的 CRL 编号
    let metadata = repository.current_crl_metadata().unwrap();
    assert_eq!(metadata.crl_number, BigUint::from(41u32));
    assert_eq!(metadata.revoked_count, 1);
    assert_eq!((metadata.next_update - metadata.this_update).num_days(), 7);

    println!("✅ CRL 编号恢复测试通过");
}

/// 测试签发、吊销和状态查询的完整流程
#[test]
fn test_issue_revoke_and_status() {
    println!("开始签发吊销流程测试");

    let temp_dir = TempDir::new().unwrap();
    let repository = Arc::new(repository_for(temp_dir.path(), false));
    let lookup = StatusLookup::new(repository.clone());

    repository.add_certificate(LEAF1_DER).unwrap();
    repository.add_certificate(LEAF2_DER).unwrap();

    let leaf1 = BigUint::from(0x5f3a9c01d2e4b7a8u64);
    let leaf2 = BigUint::from(0x0e11aa4b9902c3u64);
    assert_eq!(lookup.status_of(&leaf1).unwrap(), CertificateStatus::Good);

    let time = Local.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap().with_timezone(&Utc);
    repository.revoke_certificate(&leaf1, 6, Some(time)).unwrap();
    assert_eq!(
        lookup.status_of(&leaf1).unwrap(),
        CertificateStatus::Revoked {
            revocation_time: time,
            reason: 6,
        }
    );

    // 解除冻结后恢复有效
    repository.revoke_certificate(&leaf1, 8, None).unwrap();
    assert_eq!(lookup.status_of(&leaf1).unwrap(), CertificateStatus::Good);

    repository.revoke_certificate(&leaf2, 1, Some(time)).unwrap();
    assert!(repository.revoke_certificate(&leaf2, 6, None).is_err());
    assert_eq!(repository.revoked_certificates().unwrap().len(), 1);

    println!("✅ 签发吊销流程测试通过");
}

/// 测试主题标识缺失的证书被拒绝但不影响后续签发
#[test]
fn test_rejected_certificate_does_not_stop_issuance() {
    let temp_dir = TempDir::new().unwrap();
    let repository = repository_for(temp_dir.path(), false);

    let err = repository.add_certificate(LEAF3_DER).unwrap_err();
    assert!(!err.is_critical());
    assert_eq!(err.code(), 6202);

    repository.add_certificate(LEAF1_DER).unwrap();
    assert!(!repository.is_critical_storage_error());

    println!("✅ 证书拒绝测试通过");
}

/// 测试写入失败后必须重启
#[test]
fn test_durability_failure_requires_restart() {
    let temp_dir = TempDir::new().unwrap();
    let storage_dir = temp_dir.path().join("sign");
    fs::create_dir(&storage_dir).unwrap();
    let repository = repository_for(&storage_dir, false);

    fs::remove_dir_all(&storage_dir).unwrap();
    assert!(repository.add_certificate(LEAF1_DER).unwrap_err().is_critical());

    fs::create_dir(&storage_dir).unwrap();
    assert!(repository.add_certificate(LEAF1_DER).unwrap_err().is_critical());

    // 重启后恢复
    let restarted = repository_for(&storage_dir, false);
    restarted.add_certificate(LEAF1_DER).unwrap();

    println!("✅ 写入失败锁定测试通过");
}

/// 测试加密存储的导出
#[test]
fn test_encrypted_issuance_is_readable_offline() {
    let temp_dir = TempDir::new().unwrap();
    let repository = repository_for(temp_dir.path(), true);
    repository.add_certificate(LEAF1_DER).unwrap();
    repository.add_certificate(LEAF2_DER).unwrap();

    let path = repository.log().storage_file_for(Local::now().date_naive());
    let codec: &StorageCodec = repository.log().codec().unwrap();
    let ids: Vec<String> = StoredRecordIterator::open(&path)
        .unwrap()
        .map(|record| record.unwrap().subject_id(Some(codec), None).unwrap())
        .collect();

    assert_eq!(ids, ["196405065683", "198001011234"]);

    println!("✅ 加密存储导出测试通过");
}

/// 测试并发签发和吊销
#[test]
fn test_concurrent_issuance_and_revocation() {
    let temp_dir = TempDir::new().unwrap();
    let repository = Arc::new(repository_for(temp_dir.path(), false));

    let handles: Vec<_> = (0..8u32)
        .map(|i| {
            let repository = repository.clone();
            thread::spawn(move || {
                repository.add_certificate(LEAF1_DER).unwrap();
                repository
                    .revoke_certificate(&BigUint::from(1000u32 + i), 1, None)
                    .unwrap();
                repository.next_crl_number()
            })
        })
        .collect();

    let mut numbers: Vec<BigUint> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    numbers.sort();
    let expected: Vec<BigUint> = (1..=8u32).map(BigUint::from).collect();
    assert_eq!(numbers, expected);

    let path = repository.log().storage_file_for(Local::now().date_naive());
    assert_eq!(StoredRecordIterator::open(&path).unwrap().count(), 8);
    assert_eq!(repository.revoked_certificates().unwrap().len(), 8);

    println!("✅ 并发测试通过");
}

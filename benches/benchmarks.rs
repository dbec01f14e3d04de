//! # ca-repo 性能基准测试
//!
//! 使用 Criterion 进行性能基准测试

use ca_repo::{CertificateRepository, HighVolumeRepository};
use ca_storage::{CertificateLog, RevocationLedger, StorageCodec};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tempfile::TempDir;

const LEAF1_DER: &[u8] = include_bytes!("../src/crates/ca-storage/tests/fixtures/leaf1.der");

// 证书加密性能测试
fn bench_codec_encrypt(c: &mut Criterion) {
    let codec = StorageCodec::new("bench-password", "key01", b"bench-salt").unwrap();

    c.bench_function("codec_encrypt_compressed", |b| {
        b.iter(|| {
            // 使用 black_box 防止编译器优化
            let _ = black_box(codec.encrypt(black_box(LEAF1_DER), true).unwrap());
        });
    });

    c.bench_function("codec_encrypt_plain", |b| {
        b.iter(|| {
            let _ = black_box(codec.encrypt(black_box(b"196405065683"), false).unwrap());
        });
    });
}

// 证书存储性能测试
fn bench_add_certificate(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let log = CertificateLog::new(temp_dir.path(), None).unwrap();
    let ledger = RevocationLedger::open(temp_dir.path().join("revoked.json")).unwrap();
    let repository = HighVolumeRepository::new(log, ledger, temp_dir.path().join("sign.crl")).unwrap();

    c.bench_function("add_certificate_plain", |b| {
        b.iter(|| repository.add_certificate(black_box(LEAF1_DER)).unwrap());
    });
}

// 创建基准测试组
criterion_group!(benches, bench_codec_encrypt, bench_add_certificate);

// 主入口
criterion_main!(benches);

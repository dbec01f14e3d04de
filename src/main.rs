//! # ca-repo 运维工具
//!
//! 离线查看和维护证书仓库：导出证书日志、查看吊销列表、查询证书状态、
//! 手工吊销证书以及查看当前 CRL。

use ca_repo::config::{default_config_path, load_config};
use ca_repo::{
    CertificateRepository, CertificateStatus, CrlMetadataProvider, HighVolumeRepository,
    RepositoryConfig, RepositoryError, StatusLookup,
};
use ca_storage::{
    parse_serial_hex, CrlReason, RevocationLedger, StorageConfig, StoredRecordIterator,
    STORE_FILE_PREFIX,
};
use chrono::{DateTime, Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use num_bigint::BigUint;
use std::path::PathBuf;
use std::sync::Arc;

const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// CA 证书仓库运维工具
#[derive(Parser, Debug)]
#[command(name = "ca-repo", version, about)]
struct Cli {
    /// 配置文件（TOML 格式），缺省读取环境变量 CA_REPO_CONFIG 或 ca-repo.toml
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 导出一天的证书日志
    Export {
        /// 实例名
        #[arg(short, long)]
        instance: String,

        /// 日期，缺省为今天
        #[arg(short, long, value_name = "YYYY-MM-DD")]
        date: Option<NaiveDate>,

        /// 解密加密记录
        #[arg(long)]
        decrypt: bool,
    },

    /// 列出已吊销证书
    Revoked {
        #[arg(short, long)]
        instance: String,
    },

    /// 查询证书状态
    Status {
        #[arg(short, long)]
        instance: String,

        /// 十六进制序列号
        #[arg(short, long, value_name = "HEX")]
        serial: String,
    },

    /// 吊销证书
    Revoke {
        #[arg(short, long)]
        instance: String,

        /// 十六进制序列号
        #[arg(short, long, value_name = "HEX")]
        serial: String,

        /// 吊销原因码
        #[arg(short, long, value_name = "CODE")]
        reason: i32,
    },

    /// 查看当前 CRL
    CrlInfo {
        #[arg(short, long)]
        instance: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = load_config(&config_path)?;

    // 初始化日志
    let level = config.log_level.parse().unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();
    tracing::info!("从配置文件加载: {}", config_path.display());

    match cli.command {
        Command::Export {
            instance,
            date,
            decrypt,
        } => export(&config, &instance, date, decrypt),
        Command::Revoked { instance } => list_revoked(&config, &instance),
        Command::Status { instance, serial } => status(&config, &instance, &serial),
        Command::Revoke {
            instance,
            serial,
            reason,
        } => revoke(&config, &instance, &serial, reason),
        Command::CrlInfo { instance } => crl_info(&config, &instance),
    }
}

fn export(
    config: &RepositoryConfig,
    instance: &str,
    date: Option<NaiveDate>,
    decrypt: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let storage = &config.instance(instance)?.storage;
    let date = date.unwrap_or_else(|| Local::now().date_naive());
    let path = storage
        .storage_directory()
        .join(format!("{}{}", STORE_FILE_PREFIX, date.format("%Y-%m-%d")));

    let codec = if decrypt { storage.build_codec()? } else { None };
    let key_store = storage.key_store();

    let mut count = 0usize;
    for record in StoredRecordIterator::open(&path)? {
        let record = record?;
        let subject_id = if decrypt || !record.is_encrypted() {
            record.subject_id(codec.as_ref(), Some(&key_store))?
        } else {
            "<已加密>".to_string()
        };

        println!(
            "{}\t{}\t{}\t{}",
            record.serial,
            record.issued_at.format(DISPLAY_TIME_FORMAT),
            record.expires_at.format(DISPLAY_TIME_FORMAT),
            subject_id
        );
        count += 1;
    }

    tracing::info!("已导出 {} 条记录: {}", count, path.display());
    Ok(())
}

fn list_revoked(config: &RepositoryConfig, instance: &str) -> Result<(), Box<dyn std::error::Error>> {
    let ledger = open_ledger(&config.instance(instance)?.storage)?;

    for entry in ledger.list()? {
        println!(
            "{:x}\t{}\t{}",
            entry.serial,
            format_time(&entry.revocation_time),
            reason_name(entry.reason)
        );
    }
    Ok(())
}

fn status(
    config: &RepositoryConfig,
    instance: &str,
    serial: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let serial = parse_serial(serial)?;
    let repository = open_repository(config, instance)?;
    let lookup = StatusLookup::new(Arc::new(repository));

    match lookup.status_of(&serial)? {
        CertificateStatus::Good => println!("{:x}\tgood", serial),
        CertificateStatus::Revoked {
            revocation_time,
            reason,
        } => println!(
            "{:x}\trevoked\t{}\t{}",
            serial,
            format_time(&revocation_time),
            reason_name(reason)
        ),
    }
    Ok(())
}

fn revoke(
    config: &RepositoryConfig,
    instance: &str,
    serial: &str,
    reason: i32,
) -> Result<(), Box<dyn std::error::Error>> {
    let serial = parse_serial(serial)?;
    let repository = open_repository(config, instance)?;

    repository.revoke_certificate(&serial, reason, None)?;
    println!("{:x}\t{}", serial, reason_name(reason));
    Ok(())
}

fn crl_info(config: &RepositoryConfig, instance: &str) -> Result<(), Box<dyn std::error::Error>> {
    let repository = open_repository(config, instance)?;

    match repository.current_crl() {
        Some(crl) => {
            let metadata = repository.current_crl_metadata()?;
            println!("CRL 文件:     {} ({} 字节)", repository.crl_file().display(), crl.len());
            println!("CRL 编号:     {}", metadata.crl_number);
            println!("本次更新:     {}", format_time(&metadata.this_update));
            println!("下次更新:     {}", format_time(&metadata.next_update));
            println!("吊销条目:     {}", metadata.revoked_count);
        }
        None => println!("CRL 文件:     {} (不存在)", repository.crl_file().display()),
    }
    println!("下一个编号:   {}", repository.current_crl_number() + 1u32);
    Ok(())
}

fn open_repository(
    config: &RepositoryConfig,
    instance: &str,
) -> Result<HighVolumeRepository, Box<dyn std::error::Error>> {
    Ok(HighVolumeRepository::from_instance_config(instance, config.instance(instance)?)?)
}

fn open_ledger(storage: &StorageConfig) -> Result<RevocationLedger, Box<dyn std::error::Error>> {
    Ok(RevocationLedger::open(storage.revocation_file())?)
}

fn parse_serial(serial: &str) -> Result<BigUint, RepositoryError> {
    parse_serial_hex(serial).ok_or_else(|| RepositoryError::InvalidSerial(serial.to_string()))
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.with_timezone(&Local).format(DISPLAY_TIME_FORMAT).to_string()
}

fn reason_name(code: i32) -> String {
    CrlReason::from_code(code)
        .map(|reason| reason.name().to_string())
        .unwrap_or_else(|| code.to_string())
}

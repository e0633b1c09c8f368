use super::*;

#[test]
fn empty_file_fills_in_every_default() {
    let raw: RawConfig = serde_yaml::from_str("").unwrap();
    let config = Config::from_raw(raw).unwrap();

    assert_eq!(config.server.addr.port(), 9201);
    assert!(config.clickhouse_servers.is_empty());
    assert_eq!(config.reader.mode, ReaderMode::QuantileAggregated);
    assert_eq!(config.reader.max_samples, 11_000);
    assert_eq!(config.writer.batch, 32_768);
    assert_eq!(config.logger.level_console, "info");
}

#[test]
fn partial_file_only_overrides_named_fields() {
    let yaml = r#"
server:
  addr: "127.0.0.1:9999"
reader:
  mode: 3
  quantile: 0.9
"#;
    let raw: RawConfig = serde_yaml::from_str(yaml).unwrap();
    let config = Config::from_raw(raw).unwrap();

    assert_eq!(config.server.addr.port(), 9999);
    assert_eq!(config.server.timeout.as_secs(), 30); // untouched default
    assert_eq!(config.reader.mode, ReaderMode::DualTableJoin);
    assert_eq!(config.reader.quantile, 0.9);
    assert_eq!(config.reader.min_step, 15); // untouched default
}

#[test]
fn clickhouse_servers_map_parses_named_backends() {
    let yaml = r#"
clickhouse_servers:
  main:
    host: "ch1:9000"
    database: "metrics"
  replica:
    dsn: "tcp://explicit/dsn"
"#;
    let raw: RawConfig = serde_yaml::from_str(yaml).unwrap();
    let config = Config::from_raw(raw).unwrap();

    assert_eq!(config.clickhouse_servers.len(), 2);
    let main = &config.clickhouse_servers["main"];
    assert_eq!(main.host, "ch1:9000");
    assert_eq!(main.database, "metrics");
    let replica = &config.clickhouse_servers["replica"];
    assert_eq!(replica.build_dsn(), "tcp://explicit/dsn");
}

#[test]
fn invalid_server_addr_is_rejected() {
    let yaml = r#"
server:
  addr: "not-an-address"
"#;
    let raw: RawConfig = serde_yaml::from_str(yaml).unwrap();
    assert!(Config::from_raw(raw).is_err());
}

#[test]
fn invalid_reader_mode_is_rejected() {
    let yaml = r#"
reader:
  mode: 9
"#;
    let raw: RawConfig = serde_yaml::from_str(yaml).unwrap();
    assert!(Config::from_raw(raw).is_err());
}

#[test]
fn malformed_yaml_is_rejected() {
    let yaml = "server: [this, is, not, a, map]";
    let result: Result<RawConfig, _> = serde_yaml::from_str(yaml);
    assert!(result.is_err());
}

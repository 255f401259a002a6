// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

/// Coordination core configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL for the sequence row store
    pub database_url: String,
    /// Default floor for port allocation when a request does not bring one
    pub port_range_start: u16,
    /// Capacity of the in-process execution log buffer, in lines
    pub log_buffer_max_lines: usize,
    /// Whether unknown sequence names are created on first use
    pub sequence_auto_create: bool,
    /// Start value for auto-created sequences
    pub sequence_default_start: i64,
    /// Schema holding the sequence table, when not the connection default
    pub sequence_schema: Option<String>,
    /// Table holding one row per sequence
    pub sequence_table: String,
    /// Column holding the sequence name
    pub sequence_name_column: String,
    /// Column holding the sequence's current value
    pub sequence_value_column: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `FERROFLOW_DATABASE_URL`: PostgreSQL connection string
    ///
    /// Optional (with defaults):
    /// - `FERROFLOW_PORT_RANGE_START`: port allocation floor (default: 40000)
    /// - `FERROFLOW_LOG_BUFFER_MAX_LINES`: log buffer capacity (default: 5000)
    /// - `FERROFLOW_SEQUENCE_AUTO_CREATE`: create unknown sequences (default: false)
    /// - `FERROFLOW_SEQUENCE_DEFAULT_START`: auto-created start value (default: 0)
    /// - `FERROFLOW_SEQUENCE_SCHEMA`: sequence table schema (default: unset)
    /// - `FERROFLOW_SEQUENCE_TABLE`: sequence table name (default: slave_sequences)
    /// - `FERROFLOW_SEQUENCE_NAME_COLUMN`: name column (default: sequence_name)
    /// - `FERROFLOW_SEQUENCE_VALUE_COLUMN`: value column (default: sequence_value)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("FERROFLOW_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("FERROFLOW_DATABASE_URL"))?;

        let port_range_start: u16 = std::env::var("FERROFLOW_PORT_RANGE_START")
            .unwrap_or_else(|_| "40000".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("FERROFLOW_PORT_RANGE_START", "must be a valid port number")
            })?;

        let log_buffer_max_lines: usize = std::env::var("FERROFLOW_LOG_BUFFER_MAX_LINES")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid(
                    "FERROFLOW_LOG_BUFFER_MAX_LINES",
                    "must be a positive integer",
                )
            })?;

        let sequence_auto_create = match std::env::var("FERROFLOW_SEQUENCE_AUTO_CREATE")
            .unwrap_or_else(|_| "false".to_string())
            .as_str()
        {
            "true" | "1" | "yes" | "y" => true,
            "false" | "0" | "no" | "n" => false,
            _ => {
                return Err(ConfigError::Invalid(
                    "FERROFLOW_SEQUENCE_AUTO_CREATE",
                    "must be true or false",
                ));
            }
        };

        let sequence_default_start: i64 = std::env::var("FERROFLOW_SEQUENCE_DEFAULT_START")
            .unwrap_or_else(|_| "0".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("FERROFLOW_SEQUENCE_DEFAULT_START", "must be an integer")
            })?;

        let sequence_schema = std::env::var("FERROFLOW_SEQUENCE_SCHEMA").ok();
        let sequence_table = std::env::var("FERROFLOW_SEQUENCE_TABLE")
            .unwrap_or_else(|_| "slave_sequences".to_string());
        let sequence_name_column = std::env::var("FERROFLOW_SEQUENCE_NAME_COLUMN")
            .unwrap_or_else(|_| "sequence_name".to_string());
        let sequence_value_column = std::env::var("FERROFLOW_SEQUENCE_VALUE_COLUMN")
            .unwrap_or_else(|_| "sequence_value".to_string());

        Ok(Self {
            database_url,
            port_range_start,
            log_buffer_max_lines,
            sequence_auto_create,
            sequence_default_start,
            sequence_schema,
            sequence_table,
            sequence_name_column,
            sequence_value_column,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}

use std::collections::HashMap;

use ethers::abi::{RawLog, Token};
use ethers::types::{Address, Log, U256};

use super::EventDecodeError;
use crate::contracts::ContractEvent;

/// Decoded parameters of a log, looked up by name
pub struct EventParams {
    value: HashMap<String, Token>,
}

impl EventParams {
    pub fn parse(event: &ContractEvent, log: &Log) -> Result<Self, EventDecodeError> {
        let raw_log = RawLog {
            topics: log.topics.clone(),
            data: log.data.to_vec(),
        };
        let parsed = event
            .value
            .parse_log(raw_log)
            .map_err(|error| EventDecodeError::Abi(error.to_string()))?;

        Ok(Self {
            value: parsed.params.into_iter().map(|param| (param.name, param.value)).collect(),
        })
    }

    pub fn get_address(&self, key: &'static str) -> Result<Address, EventDecodeError> {
        self.get_token(key)?.into_address().ok_or(EventDecodeError::MissingParam(key))
    }

    pub fn get_uint(&self, key: &'static str) -> Result<U256, EventDecodeError> {
        self.get_token(key)?.into_uint().ok_or(EventDecodeError::MissingParam(key))
    }

    fn get_token(&self, key: &'static str) -> Result<Token, EventDecodeError> {
        self.value.get(key).cloned().ok_or(EventDecodeError::MissingParam(key))
    }
}

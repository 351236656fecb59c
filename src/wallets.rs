//! Wallet addresses mentioned in a user message.
//!
//! Addresses are numbered `wallet_0..wallet_n` in order of first appearance.
//! The book patches tool arguments the model fills in (models tend to mangle
//! 40-digit hex strings) and expands `{wallet_i}` placeholders in answers.

use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::sync::LazyLock;

use crate::providers::ToolCall;

static ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"0x[a-fA-F0-9]{40}").expect("address pattern is valid"));

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(wallet_\d+)\}").expect("placeholder pattern is valid"));

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletBook {
    addresses: Vec<String>,
}

impl WalletBook {
    /// Duplicate addresses (ignoring case) keep their first slot.
    pub fn extract(text: &str) -> Self {
        let mut addresses: Vec<String> = Vec::new();
        for found in ADDRESS.find_iter(text) {
            let address = found.as_str();
            if !addresses.iter().any(|known| known.eq_ignore_ascii_case(address)) {
                addresses.push(address.to_string());
            }
        }
        Self { addresses }
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let index: usize = key.strip_prefix("wallet_")?.parse().ok()?;
        self.addresses.get(index).map(String::as_str)
    }

    /// Overwrite the address argument of the first tool call. Returns true
    /// when an argument was rewritten.
    pub fn inject(&self, tool_calls: &mut [ToolCall]) -> bool {
        let (Some(call), Some(first)) = (tool_calls.first_mut(), self.addresses.first()) else {
            return false;
        };

        let (key, value) = match call.name.as_str() {
            "get_erc20_tokens" => ("owner_address", Value::String(first.clone())),
            "resolve" => ("input_data", Value::String(first.clone())),
            "get_token_prices" => (
                "token_addresses",
                Value::Array(self.addresses.iter().cloned().map(Value::String).collect()),
            ),
            _ => return false,
        };

        if !call.arguments.is_object() {
            call.arguments = Value::Object(Map::new());
        }
        if let Some(arguments) = call.arguments.as_object_mut() {
            arguments.insert(key.to_string(), value);
        }
        true
    }

    /// Replace `{wallet_i}` placeholders with their addresses. Unknown
    /// placeholders and any other braces are left as written.
    pub fn render(&self, text: &str) -> String {
        if self.is_empty() {
            return text.to_string();
        }

        PLACEHOLDER
            .replace_all(text, |caps: &Captures| match self.get(&caps[1]) {
                Some(address) => address.to_string(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }
}

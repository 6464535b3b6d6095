use std::sync::Arc;

use alloy::dyn_abi::JsonAbiExt;
use alloy::json_abi::JsonAbi;
use alloy::primitives::{Address, Bytes};
use alloy::sol;
use serde_json::Value;

use super::args::coerce_args;
use crate::error::{DeployError, Result};

sol! {
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
    }

    interface IOwnable {
        function transferOwnership(address newOwner) external;
    }
}

/// An on-chain contract bound to its ABI
#[derive(Debug, Clone, PartialEq)]
pub struct ContractHandle {
    address: Address,
    abi: Arc<JsonAbi>,
}

impl ContractHandle {
    pub fn new(address: Address, abi: Arc<JsonAbi>) -> Self {
        Self { address, abi }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn abi(&self) -> &JsonAbi {
        &self.abi
    }

    /// Calldata for `function(args)`, choosing the overload with matching arity
    pub fn encode_call(&self, function: &str, args: &[Value]) -> Result<Bytes> {
        encode_function_call(&self.abi, function, args)
    }

    /// ABI-encoded constructor arguments, without bytecode
    pub fn encode_constructor_args(&self, args: &[Value]) -> Result<Bytes> {
        encode_constructor(&self.abi, args)
    }
}

pub(crate) fn encode_function_call(abi: &JsonAbi, function: &str, args: &[Value]) -> Result<Bytes> {
    let overloads = abi
        .function(function)
        .ok_or_else(|| DeployError::invalid_args(format!("ABI has no function `{function}`")))?;

    let func = overloads
        .iter()
        .find(|f| f.inputs.len() == args.len())
        .ok_or_else(|| {
            DeployError::invalid_args(format!(
                "no `{function}` overload takes {} arguments",
                args.len()
            ))
        })?;

    let values = coerce_args(&func.inputs, args)?;
    let calldata = func
        .abi_encode_input(&values)
        .map_err(|e| DeployError::invalid_args(format!("failed to encode `{function}`: {e}")))?;

    Ok(calldata.into())
}

pub(crate) fn encode_constructor(abi: &JsonAbi, args: &[Value]) -> Result<Bytes> {
    match abi.constructor() {
        Some(constructor) => {
            let values = coerce_args(&constructor.inputs, args)?;
            let encoded = constructor.abi_encode_input(&values).map_err(|e| {
                DeployError::invalid_args(format!("failed to encode constructor: {e}"))
            })?;
            Ok(encoded.into())
        }
        None if args.is_empty() => Ok(Bytes::new()),
        None => Err(DeployError::invalid_args(format!(
            "contract has no constructor but {} arguments were given",
            args.len()
        ))),
    }
}

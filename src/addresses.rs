use super::types::Protocol;

use ethers::types::Address;

use once_cell::sync::Lazy;
use std::collections::HashMap;

pub fn lookup(address: Address) -> String {
    ADDRESSBOOK
        .get(&address)
        .cloned()
        .unwrap_or_else(|| format!("{:?}", &address))
}

fn insert_many<T: Clone>(
    mut map: HashMap<Address, T>,
    addrs: &[&str],
    value: T,
) -> HashMap<Address, T> {
    for addr in addrs {
        map.insert(parse_address(addr), value.clone());
    }
    map
}

/// Wrapped Ether on mainnet, the default wrapped native token
pub static WETH: Lazy<Address> =
    Lazy::new(|| parse_address("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"));

/// The routers of the supported protocols. Swaps whose transaction sender is
/// unknown and whose event sender is one of these cannot be attributed.
pub static ROUTERS: Lazy<HashMap<Address, Protocol>> = Lazy::new(|| {
    let map = HashMap::new();
    let map = insert_many(
        map,
        &[
            // uni router 02
            "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D",
            // uni router 01
            "0xf164fC0Ec4E93095b804a4795bBe1e041497b92a",
        ],
        Protocol::UniswapV2,
    );
    let map = insert_many(
        map,
        &["0xd9e1cE17f2641f24aE83637ab66a2cca9C378B9F"],
        Protocol::SushiswapV2,
    );
    insert_many(
        map,
        &["0xEfF92A263d31888d860bD50809A8D171709b7b1c"],
        Protocol::PancakeSwapV2,
    )
});

pub static ADDRESSBOOK: Lazy<HashMap<Address, String>> = Lazy::new(|| {
    let map: HashMap<Address, String> = [
        (
            "0x7a250d5630b4cf539739df2c5dacb4c659f2488d",
            "Uniswap Router V2",
        ),
        (
            "0xf164fC0Ec4E93095b804a4795bBe1e041497b92a",
            "Uniswap Router V1",
        ),
        (
            "0xd9e1cE17f2641f24aE83637ab66a2cca9C378B9F",
            "Sushiswap Router",
        ),
        (
            "0xEfF92A263d31888d860bD50809A8D171709b7b1c",
            "PancakeSwap Router V2",
        ),
        (
            "0xb4e16d0168e52d35cacd2c6185b44281ec28c9dc",
            "UniswapPair USDC/WETH",
        ),
        (
            "0x397ff1542f962076d0bfe58ea045ffa2d347aca0",
            "SushiswapPair USDC/WETH",
        ),
        // Tokens
        ("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48", "USDC"),
        ("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2", "WETH"),
        ("0x6B175474E89094C44DA98B954EEDEAC495271D0F", "DAI"),
        ("0xdac17f958d2ee523a2206206994597c13d831ec7", "USDT"),
        ("0x2260fac5e5542a773aa44fbcfedf7c193bc2c599", "WBTC"),
        ("0x0bc529c00c6401aef6d220be8c6ea1667f6ad93e", "YFI"),
        ("0x514910771af9ca656af840dff83e8264ecf986ca", "LINK"),
    ]
    .iter()
    .map(|(addr, label)| (parse_address(addr), label.to_string()))
    .collect();

    // https://github.com/flashbots/mev-inspect/blob/master/src/InspectorKnownBot.ts#L17
    insert_many(
        map,
        &[
            "0x8be4db5926232bc5b02b841dbede8161924495c4", // sandwich bot
            "0x9799b475dec92bd99bbdd943013325c36157f383",
            "0xad572bba83cd36902b508e89488b0a038986a9f3",
            "0x00000000553a85582988aa8ad43fb7dda2466bc7",
            "0xa619651c323923ecd5a8e5311771d57ac7e64d87",
        ],
        "KNOWN BOT".to_string(),
    )
});

/// Parses a hex address, with or without the `0x` prefix. Only used on the
/// constants in this module.
pub fn parse_address(addr: &str) -> Address {
    let addr = addr.strip_prefix("0x").unwrap_or(addr);
    addr.parse().expect("hardcoded address is valid hex")
}

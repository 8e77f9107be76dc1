ethers::contract::abigen!(
    OracleContract,
    r#"[
        function newOracleClaim(uint8 _claimType, bytes _chain33Sender, address _ethereumReceiver, address _tokenAddress, string _symbol, uint256 _amount, bytes32 _claimID, bytes _signature)
    ]"#,
);

ethers::contract::abigen!(
    BridgeRegistryContract,
    r#"[
        function bridgeBank() view returns (address)
        function oracle() view returns (address)
    ]"#,
);

ethers::contract::abigen!(
    BridgeTokenContract,
    r#"[
        function decimals() view returns (uint8)
    ]"#,
);

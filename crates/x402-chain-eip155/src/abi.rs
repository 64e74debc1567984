//! Minimal ERC-20 extensions this facilitator calls on-chain.
//!
//! No ABI JSON ships with this workspace, so the fragments are declared
//! inline via `sol!` — the same approach the corpus falls back to for
//! contracts it has no bundled ABI file for (e.g. its Permit2 proxy).

use alloy_sol_types::sol;

sol! {
    #[sol(rpc)]
    interface Erc20Extended {
        function transferWithAuthorization(
            address from,
            address to,
            uint256 value,
            uint256 validAfter,
            uint256 validBefore,
            bytes32 nonce,
            bytes signature
        ) external;

        function permit(
            address owner,
            address spender,
            uint256 value,
            uint256 deadline,
            uint8 v,
            bytes32 r,
            bytes32 s
        ) external;

        function transferFrom(address from, address to, uint256 value) external returns (bool);

        function allowance(address owner, address spender) external view returns (uint256);

        function balanceOf(address account) external view returns (uint256);

        function version() external view returns (string);
    }
}

/// EIP-712 `Permit` struct, for recomputing the signing hash during verify.
sol! {
    #[derive(Debug)]
    struct Permit {
        address owner;
        address spender;
        uint256 value;
        uint256 nonce;
        uint256 deadline;
    }
}

/// EIP-3009 `TransferWithAuthorization` struct, for recomputing the signing hash.
sol! {
    #[derive(Debug)]
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
}

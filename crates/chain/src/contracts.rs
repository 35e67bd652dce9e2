//! Token and swap network bindings.
//!
//! The lending protocol interface lives in `keeper_core::contracts`.

use alloy::sol;

sol! {
    /// Standard ERC20 interface (subset for balances and approvals)
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }
}

sol! {
    /// Conversion-path swap network.
    ///
    /// Paths alternate token and pool anchor addresses, so a path through one
    /// pool has 3 entries and a path through two pools has 5.
    #[sol(rpc)]
    interface ISwapNetwork {
        function conversionPath(address sourceToken, address targetToken)
            external view returns (address[] memory);

        function rateByPath(address[] path, uint256 amount)
            external view returns (uint256);

        function convertByPath(
            address[] path,
            uint256 amount,
            uint256 minReturn,
            address beneficiary,
            address affiliateAccount,
            uint256 affiliateFee
        ) external payable returns (uint256);
    }
}

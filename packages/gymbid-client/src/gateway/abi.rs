//! Solidity interfaces of the contracts the client talks to.

use alloy_sol_types::sol;

sol! {
    interface IAuction {
        function auctionItems(address seller) external view returns (
            uint256 auctionID,
            address tokenAddress,
            uint256 tokenId,
            uint256 endTime,
            uint256 highestBid,
            address highestBidder,
            bool isSold,
            bool isActive
        );
        function getHighestBid(address seller) external view returns (address bidder, uint256 amount);
        function timeRemaining(address seller) external view returns (uint256 remaining);

        function startAuction(uint256 startPrice, address sellingNFT, uint256 sellingNFTId) external;
        function bidInAuction(address seller) external payable;
        function stopAuction(address seller) external;

        event StartAuction(address indexed seller, uint256 auctionId);
        event BidInAuction(address indexed bidder, uint256 amount);
        event StopAuction(address indexed winner, uint256 amount);
    }

    interface IERC721 {
        function ownerOf(uint256 tokenId) external view returns (address owner);
        function getApproved(uint256 tokenId) external view returns (address operator);
        function approve(address to, uint256 tokenId) external;
    }

    interface IGymCoin {
        function balanceOf(address account) external view returns (uint256 balance);
        function buyRate() external view returns (uint256 rate);
        function sellRate() external view returns (uint256 rate);
        function buyCoin(uint256 amount) external payable;
        function sellCoin(uint256 amount) external;
        function transfer(address recipient, uint256 amount) external returns (bool ok);
    }

    interface IUserProfiles {
        function getUserProfile(address user) external view returns (
            string username,
            string email,
            address walletAddress
        );
        function registerProfile(string username, string email) external;
    }
}

// this is private to avoid exposing unwanted types to the crate root
mod internal_solidity_types {

    #![allow(missing_docs)]

    use alloy::sol;

    sol!(
        #[allow(missing_docs)]
        #[sol(rpc)]
        #[derive(Debug, PartialEq, Eq, Hash, Default)]
        interface ZoraMarket {
            struct D256 {
                uint256 value;
            }

            struct Bid {
                uint256 amount;
                address currency;
                address bidder;
                address recipient;
                D256 sellOnShare;
            }

            event BidCreated(uint256 indexed tokenId, Bid bid);
            event BidRemoved(uint256 indexed tokenId, Bid bid);
            event BidFinalized(uint256 indexed tokenId, Bid bid);

            function bidForTokenBidder(uint256 tokenId, address bidder) external view returns (Bid memory);
        }
    );

    sol!(
        #[allow(missing_docs)]
        #[sol(rpc)]
        #[derive(Debug, PartialEq, Eq, Hash, Default)]
        interface ZoraAuctionHouse {
            event AuctionCreated(
                uint256 indexed auctionId,
                uint256 indexed tokenId,
                address indexed tokenContract,
                uint256 duration,
                uint256 reservePrice,
                address tokenOwner,
                address curator,
                uint8 curatorFeePercentage,
                address auctionCurrency
            );

            event AuctionApprovalUpdated(
                uint256 indexed auctionId,
                uint256 indexed tokenId,
                address indexed tokenContract,
                bool approved
            );

            event AuctionReservePriceUpdated(
                uint256 indexed auctionId,
                uint256 indexed tokenId,
                address indexed tokenContract,
                uint256 reservePrice
            );

            event AuctionBid(
                uint256 indexed auctionId,
                uint256 indexed tokenId,
                address indexed tokenContract,
                address sender,
                uint256 value,
                bool firstBid,
                bool extended
            );

            event AuctionDurationExtended(
                uint256 indexed auctionId,
                uint256 indexed tokenId,
                address indexed tokenContract,
                uint256 duration
            );

            event AuctionEnded(
                uint256 indexed auctionId,
                uint256 indexed tokenId,
                address indexed tokenContract,
                address tokenOwner,
                address curator,
                address winner,
                uint256 amount,
                uint256 curatorFee,
                address auctionCurrency
            );

            event AuctionCanceled(
                uint256 indexed auctionId,
                uint256 indexed tokenId,
                address indexed tokenContract,
                address tokenOwner
            );

            function auctions(uint256 auctionId) external view returns (
                uint256 tokenId,
                address tokenContract,
                bool approved,
                uint256 amount,
                uint256 duration,
                uint256 firstBidTime,
                uint256 reservePrice,
                uint8 curatorFeePercentage,
                address tokenOwner,
                address bidder,
                address curator,
                address auctionCurrency
            );
        }
    );

    sol!(
        #[allow(missing_docs)]
        #[sol(rpc)]
        #[derive(Debug, PartialEq, Eq, Hash, Default)]
        interface ERC20 {
            function symbol() external view returns (string memory);
            function decimals() external view returns (uint8);
            function name() external view returns (string memory);
        }
    );
}

pub use internal_solidity_types::ZoraMarket::{
    self, Bid, BidCreated, BidFinalized, BidRemoved, ZoraMarketInstance, D256,
};

pub use internal_solidity_types::ZoraAuctionHouse::{
    self, AuctionApprovalUpdated, AuctionBid, AuctionCanceled, AuctionCreated,
    AuctionDurationExtended, AuctionEnded, AuctionReservePriceUpdated, ZoraAuctionHouseInstance,
};

pub use internal_solidity_types::ERC20::{self, ERC20Instance};

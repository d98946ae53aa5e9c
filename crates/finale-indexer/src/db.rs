use crate::models::{AddressLookup, AuctionRole, BidRole, BidWithStatus, RoleBreakdown};
use alloy::primitives::{Address, B256, U256};
use eyre::Result;
use finale_core::models::{address_key, AuctionRecord, BidRecord};
use rusqlite::OptionalExtension;
use std::str::FromStr;
use tokio_rusqlite::{params, Connection};
use tracing::info;

const LATEST_BLOCK_KEY: &str = "latest_processed_block";

const BID_COLUMNS: &str = "id, transaction_hash, log_index, token_id, token_contract, amount, \
     amount_formatted, currency, currency_symbol, currency_decimals, bidder, recipient, \
     token_owner, timestamp, block_number, is_active, is_withdrawn, is_accepted";

const AUCTION_COLUMNS: &str = "auction_id, token_id, token_contract, amount, reserve_price, \
     duration, first_bid_time, curator_fee_percentage, auction_currency, token_owner, bidder, \
     curator, approved, is_settled";

/// Run initial table creation on an existing `tokio_rusqlite::Connection`.
pub async fn setup_database(conn: &Connection) -> Result<()> {
    let schema = r#"
        CREATE TABLE IF NOT EXISTS bids (
            id                  TEXT PRIMARY KEY,
            transaction_hash    TEXT     NOT NULL,
            log_index           INTEGER  NOT NULL,
            token_id            TEXT     NOT NULL,
            token_contract      TEXT     NOT NULL,
            amount              TEXT     NOT NULL,
            amount_formatted    TEXT     NOT NULL,
            currency            TEXT     NOT NULL,
            currency_symbol     TEXT     NOT NULL,
            currency_decimals   INTEGER  NOT NULL,
            bidder              TEXT     NOT NULL,
            recipient           TEXT     NOT NULL,
            token_owner         TEXT,
            timestamp           INTEGER,
            block_number        INTEGER  NOT NULL,
            is_active           INTEGER  NOT NULL DEFAULT 0,
            is_withdrawn        INTEGER  NOT NULL DEFAULT 0,
            is_accepted         INTEGER  NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_bids_bidder_token ON bids(bidder, token_id);

        CREATE TABLE IF NOT EXISTS auctions (
            auction_id              INTEGER PRIMARY KEY,
            token_id                TEXT     NOT NULL,
            token_contract          TEXT     NOT NULL,
            amount                  TEXT     NOT NULL,
            reserve_price           TEXT     NOT NULL,
            duration                INTEGER  NOT NULL,
            first_bid_time          INTEGER  NOT NULL,
            curator_fee_percentage  INTEGER  NOT NULL,
            auction_currency        TEXT     NOT NULL,
            token_owner             TEXT     NOT NULL,
            bidder                  TEXT     NOT NULL,
            curator                 TEXT     NOT NULL,
            approved                INTEGER  NOT NULL DEFAULT 0,
            is_settled              INTEGER  NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS bid_roles (
            address     TEXT NOT NULL,
            role        TEXT NOT NULL CHECK (role IN ('bidder', 'token_owner')),
            bid_id      TEXT NOT NULL,
            PRIMARY KEY (address, role, bid_id),
            FOREIGN KEY (bid_id) REFERENCES bids(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS auction_roles (
            address     TEXT    NOT NULL,
            role        TEXT    NOT NULL CHECK (role IN ('token_owner', 'curator', 'bidder')),
            auction_id  INTEGER NOT NULL,
            PRIMARY KEY (address, role, auction_id),
            FOREIGN KEY (auction_id) REFERENCES auctions(auction_id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS indexer_state (
            key     TEXT PRIMARY KEY,
            value   INTEGER NOT NULL
        );
    "#;

    conn.call(|conn| {
        conn.execute_batch(schema)?;
        Ok(())
    })
    .await?;
    Ok(())
}

fn other_error(message: String) -> tokio_rusqlite::Error {
    tokio_rusqlite::Error::Other(message.into())
}

fn parse_column<T: FromStr>(value: &str, column: &str) -> Result<T, tokio_rusqlite::Error> {
    T::from_str(value).map_err(|_| other_error(format!("Invalid {column} value: {value}")))
}

fn parse_u256_column(value: &str, column: &str) -> Result<U256, tokio_rusqlite::Error> {
    U256::from_str_radix(value, 10).map_err(|_| other_error(format!("Invalid {column} value: {value}")))
}

fn int_column<T: TryFrom<i64>>(value: i64, column: &str) -> Result<T, tokio_rusqlite::Error> {
    T::try_from(value).map_err(|_| other_error(format!("Invalid {column} value: {value}")))
}

fn read_bid(row: &rusqlite::Row<'_>) -> Result<BidRecord, tokio_rusqlite::Error> {
    let transaction_hash: String = row.get(1)?;
    let token_id: String = row.get(3)?;
    let token_contract: String = row.get(4)?;
    let amount: String = row.get(5)?;
    let currency: String = row.get(7)?;
    let bidder: String = row.get(10)?;
    let recipient: String = row.get(11)?;
    let token_owner: Option<String> = row.get(12)?;
    let timestamp: Option<i64> = row.get(13)?;
    let block_number: i64 = row.get(14)?;
    let log_index: i64 = row.get(2)?;
    let currency_decimals: i64 = row.get(9)?;

    Ok(BidRecord {
        id: row.get(0)?,
        transaction_hash: parse_column::<B256>(&transaction_hash, "transaction_hash")?,
        log_index: int_column(log_index, "log_index")?,
        token_id: parse_u256_column(&token_id, "token_id")?,
        token_contract: parse_column::<Address>(&token_contract, "token_contract")?,
        amount: parse_u256_column(&amount, "amount")?,
        amount_formatted: row.get(6)?,
        currency: parse_column::<Address>(&currency, "currency")?,
        currency_symbol: row.get(8)?,
        currency_decimals: int_column(currency_decimals, "currency_decimals")?,
        bidder: parse_column::<Address>(&bidder, "bidder")?,
        recipient: parse_column::<Address>(&recipient, "recipient")?,
        token_owner: token_owner
            .map(|owner| parse_column::<Address>(&owner, "token_owner"))
            .transpose()?,
        timestamp: timestamp
            .map(|t| int_column(t, "timestamp"))
            .transpose()?,
        block_number: int_column(block_number, "block_number")?,
        is_active: row.get(15)?,
        is_withdrawn: row.get(16)?,
        is_accepted: row.get(17)?,
    })
}

fn read_auction(row: &rusqlite::Row<'_>) -> Result<AuctionRecord, tokio_rusqlite::Error> {
    let auction_id: i64 = row.get(0)?;
    let token_id: String = row.get(1)?;
    let token_contract: String = row.get(2)?;
    let amount: String = row.get(3)?;
    let reserve_price: String = row.get(4)?;
    let duration: i64 = row.get(5)?;
    let first_bid_time: i64 = row.get(6)?;
    let curator_fee_percentage: i64 = row.get(7)?;
    let auction_currency: String = row.get(8)?;
    let token_owner: String = row.get(9)?;
    let bidder: String = row.get(10)?;
    let curator: String = row.get(11)?;

    Ok(AuctionRecord {
        auction_id: int_column(auction_id, "auction_id")?,
        token_id: parse_u256_column(&token_id, "token_id")?,
        token_contract: parse_column::<Address>(&token_contract, "token_contract")?,
        amount: parse_u256_column(&amount, "amount")?,
        reserve_price: parse_u256_column(&reserve_price, "reserve_price")?,
        duration: int_column(duration, "duration")?,
        first_bid_time: int_column(first_bid_time, "first_bid_time")?,
        curator_fee_percentage: int_column(curator_fee_percentage, "curator_fee_percentage")?,
        auction_currency: parse_column::<Address>(&auction_currency, "auction_currency")?,
        token_owner: parse_column::<Address>(&token_owner, "token_owner")?,
        bidder: parse_column::<Address>(&bidder, "bidder")?,
        curator: parse_column::<Address>(&curator, "curator")?,
        approved: row.get(12)?,
        is_settled: row.get(13)?,
    })
}

fn write_bid(conn: &rusqlite::Connection, bid: &BidRecord) -> rusqlite::Result<()> {
    conn.execute(
        r#"
        INSERT INTO bids (
            id, transaction_hash, log_index, token_id, token_contract, amount,
            amount_formatted, currency, currency_symbol, currency_decimals, bidder, recipient,
            token_owner, timestamp, block_number, is_active, is_withdrawn, is_accepted
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
        ON CONFLICT(id) DO UPDATE SET
            transaction_hash = excluded.transaction_hash,
            log_index = excluded.log_index,
            token_id = excluded.token_id,
            token_contract = excluded.token_contract,
            amount = excluded.amount,
            amount_formatted = excluded.amount_formatted,
            currency = excluded.currency,
            currency_symbol = excluded.currency_symbol,
            currency_decimals = excluded.currency_decimals,
            bidder = excluded.bidder,
            recipient = excluded.recipient,
            token_owner = excluded.token_owner,
            timestamp = excluded.timestamp,
            block_number = excluded.block_number,
            is_active = excluded.is_active,
            is_withdrawn = excluded.is_withdrawn,
            is_accepted = excluded.is_accepted
        "#,
        params![
            bid.id,
            bid.transaction_hash.to_string(),
            bid.log_index as i64,
            bid.token_id.to_string(),
            address_key(&bid.token_contract),
            bid.amount.to_string(),
            bid.amount_formatted,
            address_key(&bid.currency),
            bid.currency_symbol,
            bid.currency_decimals as i64,
            address_key(&bid.bidder),
            address_key(&bid.recipient),
            bid.token_owner.as_ref().map(address_key),
            bid.timestamp.map(|t| t as i64),
            bid.block_number as i64,
            bid.is_active,
            bid.is_withdrawn,
            bid.is_accepted,
        ],
    )?;

    conn.execute("DELETE FROM bid_roles WHERE bid_id = ?1", params![bid.id])?;
    let mut roles = vec![(BidRole::Bidder, bid.bidder)];
    if let Some(owner) = bid.token_owner {
        roles.push((BidRole::TokenOwner, owner));
    }
    for (role, address) in roles {
        conn.execute(
            "INSERT OR IGNORE INTO bid_roles (address, role, bid_id) VALUES (?1, ?2, ?3)",
            params![address_key(&address), role.as_str(), bid.id],
        )?;
    }
    Ok(())
}

fn write_auction(conn: &rusqlite::Connection, auction: &AuctionRecord) -> rusqlite::Result<()> {
    conn.execute(
        r#"
        INSERT INTO auctions (
            auction_id, token_id, token_contract, amount, reserve_price, duration,
            first_bid_time, curator_fee_percentage, auction_currency, token_owner, bidder,
            curator, approved, is_settled
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        ON CONFLICT(auction_id) DO UPDATE SET
            token_id = excluded.token_id,
            token_contract = excluded.token_contract,
            amount = excluded.amount,
            reserve_price = excluded.reserve_price,
            duration = excluded.duration,
            first_bid_time = excluded.first_bid_time,
            curator_fee_percentage = excluded.curator_fee_percentage,
            auction_currency = excluded.auction_currency,
            token_owner = excluded.token_owner,
            bidder = excluded.bidder,
            curator = excluded.curator,
            approved = excluded.approved,
            is_settled = excluded.is_settled
        "#,
        params![
            auction.auction_id as i64,
            auction.token_id.to_string(),
            address_key(&auction.token_contract),
            auction.amount.to_string(),
            auction.reserve_price.to_string(),
            auction.duration as i64,
            auction.first_bid_time as i64,
            auction.curator_fee_percentage as i64,
            address_key(&auction.auction_currency),
            address_key(&auction.token_owner),
            address_key(&auction.bidder),
            address_key(&auction.curator),
            auction.approved,
            auction.is_settled,
        ],
    )?;
    rebuild_auction_roles(conn, auction)
}

fn rebuild_auction_roles(conn: &rusqlite::Connection, auction: &AuctionRecord) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM auction_roles WHERE auction_id = ?1",
        params![auction.auction_id as i64],
    )?;
    let roles = [
        (AuctionRole::TokenOwner, auction.token_owner),
        (AuctionRole::Curator, auction.curator),
        (AuctionRole::Bidder, auction.bidder),
    ];
    for (role, address) in roles {
        if address == Address::ZERO {
            continue;
        }
        conn.execute(
            "INSERT OR IGNORE INTO auction_roles (address, role, auction_id) VALUES (?1, ?2, ?3)",
            params![address_key(&address), role.as_str(), auction.auction_id as i64],
        )?;
    }
    Ok(())
}

fn select_auction(
    conn: &rusqlite::Connection,
    auction_id: u64,
) -> Result<Option<AuctionRecord>, tokio_rusqlite::Error> {
    let sql = format!("SELECT {AUCTION_COLUMNS} FROM auctions WHERE auction_id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![auction_id as i64])?;
    match rows.next()? {
        Some(row) => Ok(Some(read_auction(row)?)),
        None => Ok(None),
    }
}

pub async fn upsert_bid(conn: &Connection, bid: &BidRecord) -> Result<()> {
    let bid = bid.clone();
    conn.call(move |conn| {
        let tx = conn.transaction()?;
        write_bid(&tx, &bid)?;
        tx.commit()?;
        Ok(())
    })
    .await?;
    Ok(())
}

/// Bulk upsert of parsed snapshot rows inside a single transaction.
pub async fn import_bids(conn: &Connection, bids: &[BidRecord]) -> Result<usize> {
    let bids = bids.to_vec();
    let imported = conn
        .call(move |conn| {
            let tx = conn.transaction()?;
            for bid in &bids {
                write_bid(&tx, bid)?;
            }
            tx.commit()?;
            Ok(bids.len())
        })
        .await?;
    info!(
        message = "Imported snapshot bids",
        operation = "import_bids",
        imported = imported
    );
    Ok(imported)
}

pub async fn get_bid(conn: &Connection, id: &str) -> Result<Option<BidRecord>> {
    let id = id.to_string();
    let bid = conn
        .call(move |conn| {
            let sql = format!("SELECT {BID_COLUMNS} FROM bids WHERE id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![id])?;
            match rows.next()? {
                Some(row) => Ok(Some(read_bid(row)?)),
                None => Ok(None),
            }
        })
        .await?;
    Ok(bid)
}

/// Inserts a freshly created bid as active. The Market keeps one bid per
/// (bidder, token), so any earlier active bid of the pair is deactivated.
pub async fn record_bid_created(conn: &Connection, bid: &BidRecord) -> Result<usize> {
    let mut bid = bid.clone();
    bid.is_active = true;
    bid.is_withdrawn = false;
    bid.is_accepted = false;

    let replaced = conn
        .call(move |conn| {
            let tx = conn.transaction()?;
            let replaced = tx.execute(
                r#"
                UPDATE bids SET is_active = 0
                WHERE bidder = ?1 AND token_id = ?2 AND is_active = 1 AND id != ?3
                "#,
                params![address_key(&bid.bidder), bid.token_id.to_string(), bid.id],
            )?;
            write_bid(&tx, &bid)?;
            tx.commit()?;
            Ok(replaced)
        })
        .await?;
    Ok(replaced)
}

/// Marks the active bid of (bidder, token) as withdrawn. Returns the number of rows touched.
pub async fn record_bid_removed(conn: &Connection, token_id: U256, bidder: Address) -> Result<usize> {
    let updated = conn
        .call(move |conn| {
            let updated = conn.execute(
                r#"
                UPDATE bids SET is_active = 0, is_withdrawn = 1
                WHERE bidder = ?1 AND token_id = ?2 AND is_active = 1
                "#,
                params![address_key(&bidder), token_id.to_string()],
            )?;
            Ok(updated)
        })
        .await?;
    Ok(updated)
}

/// Marks the active bid of (bidder, token) as accepted by the owner.
pub async fn record_bid_finalized(conn: &Connection, token_id: U256, bidder: Address) -> Result<usize> {
    let updated = conn
        .call(move |conn| {
            let updated = conn.execute(
                r#"
                UPDATE bids SET is_active = 0, is_accepted = 1
                WHERE bidder = ?1 AND token_id = ?2 AND is_active = 1
                "#,
                params![address_key(&bidder), token_id.to_string()],
            )?;
            Ok(updated)
        })
        .await?;
    Ok(updated)
}

pub async fn upsert_auction(conn: &Connection, auction: &AuctionRecord) -> Result<()> {
    let auction = auction.clone();
    conn.call(move |conn| {
        let tx = conn.transaction()?;
        write_auction(&tx, &auction)?;
        tx.commit()?;
        Ok(())
    })
    .await?;
    Ok(())
}

pub async fn get_auction(conn: &Connection, auction_id: u64) -> Result<Option<AuctionRecord>> {
    let auction = conn.call(move |conn| select_auction(conn, auction_id)).await?;
    Ok(auction)
}

/// Loads an auction, applies `update` and writes it back with rebuilt role rows.
/// Returns false when the auction is not stored.
async fn update_auction<F>(conn: &Connection, auction_id: u64, update: F) -> Result<bool>
where
    F: FnOnce(&mut AuctionRecord) + Send + 'static,
{
    let updated = conn
        .call(move |conn| {
            let tx = conn.transaction()?;
            let Some(mut auction) = select_auction(&tx, auction_id)? else {
                return Ok(false);
            };
            update(&mut auction);
            write_auction(&tx, &auction)?;
            tx.commit()?;
            Ok(true)
        })
        .await?;
    Ok(updated)
}

/// Records a new highest bid. `first_bid_time` is set only on the first bid.
pub async fn record_auction_bid(
    conn: &Connection,
    auction_id: u64,
    bidder: Address,
    amount: U256,
    bid_time: u64,
) -> Result<bool> {
    update_auction(conn, auction_id, move |auction| {
        if auction.first_bid_time == 0 {
            auction.first_bid_time = bid_time;
        }
        auction.bidder = bidder;
        auction.amount = amount;
    })
    .await
}

pub async fn set_auction_approval(conn: &Connection, auction_id: u64, approved: bool) -> Result<bool> {
    update_auction(conn, auction_id, move |auction| auction.approved = approved).await
}

pub async fn set_auction_reserve_price(
    conn: &Connection,
    auction_id: u64,
    reserve_price: U256,
) -> Result<bool> {
    update_auction(conn, auction_id, move |auction| auction.reserve_price = reserve_price).await
}

pub async fn set_auction_duration(conn: &Connection, auction_id: u64, duration: u64) -> Result<bool> {
    update_auction(conn, auction_id, move |auction| auction.duration = duration).await
}

/// Settles an auction that ended with a winner. The winning bid becomes final.
pub async fn record_auction_ended(
    conn: &Connection,
    auction_id: u64,
    winner: Address,
    amount: U256,
) -> Result<bool> {
    update_auction(conn, auction_id, move |auction| {
        auction.bidder = winner;
        auction.amount = amount;
        auction.is_settled = true;
    })
    .await
}

/// A canceled auction stays in the store, closed without a winner.
pub async fn record_auction_canceled(conn: &Connection, auction_id: u64) -> Result<bool> {
    update_auction(conn, auction_id, |auction| auction.is_settled = true).await
}

/// Post-hoc settlement flag for auctions settled outside the indexed range.
pub async fn mark_auction_settled(conn: &Connection, auction_id: u64) -> Result<bool> {
    let updated = conn
        .call(move |conn| {
            let updated = conn.execute(
                "UPDATE auctions SET is_settled = 1 WHERE auction_id = ?1",
                params![auction_id as i64],
            )?;
            Ok(updated > 0)
        })
        .await?;
    info!(
        message = "Marked auction settled",
        operation = "mark_auction_settled",
        auction_id = auction_id,
        found = updated
    );
    Ok(updated)
}

pub async fn get_latest_processed_block(conn: &Connection) -> Result<Option<u64>> {
    let block = conn
        .call(|conn| {
            let value: Option<i64> = conn
                .query_row(
                    "SELECT value FROM indexer_state WHERE key = ?1",
                    params![LATEST_BLOCK_KEY],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value.map(|v| v as u64))
        })
        .await?;
    Ok(block)
}

pub async fn set_latest_processed_block(conn: &Connection, block_number: u64) -> Result<()> {
    conn.call(move |conn| {
        conn.execute(
            r#"
            INSERT INTO indexer_state (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
            params![LATEST_BLOCK_KEY, block_number as i64],
        )?;
        Ok(())
    })
    .await?;
    Ok(())
}

/// Every auction and bid in which `address` holds any role, each returned once.
pub async fn lookup_address(conn: &Connection, address: Address) -> Result<AddressLookup> {
    let key = address_key(&address);
    let lookup = conn
        .call(move |conn| {
            let auctions_sql = format!(
                "SELECT {AUCTION_COLUMNS} FROM auctions \
                 WHERE auction_id IN (SELECT auction_id FROM auction_roles WHERE address = ?1) \
                 ORDER BY auction_id DESC"
            );
            let mut stmt = conn.prepare(&auctions_sql)?;
            let mut rows = stmt.query(params![key])?;
            let mut auctions = Vec::new();
            while let Some(row) = rows.next()? {
                auctions.push(read_auction(row)?);
            }

            let bids_sql = format!(
                "SELECT {BID_COLUMNS} FROM bids \
                 WHERE id IN (SELECT bid_id FROM bid_roles WHERE address = ?1) \
                 ORDER BY block_number DESC, log_index DESC"
            );
            let mut stmt = conn.prepare(&bids_sql)?;
            let mut rows = stmt.query(params![key])?;
            let mut bids = Vec::new();
            while let Some(row) = rows.next()? {
                bids.push(BidWithStatus::from(read_bid(row)?));
            }

            let mut breakdown = RoleBreakdown {
                total_auctions: auctions.len(),
                total_bids: bids.len(),
                ..Default::default()
            };

            let mut stmt = conn.prepare(
                "SELECT role, COUNT(*) FROM auction_roles WHERE address = ?1 GROUP BY role",
            )?;
            let mut rows = stmt.query(params![key])?;
            while let Some(row) = rows.next()? {
                let role: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                let count = count as usize;
                match role.as_str() {
                    "token_owner" => breakdown.auctions_as_token_owner = count,
                    "curator" => breakdown.auctions_as_curator = count,
                    "bidder" => breakdown.auctions_as_bidder = count,
                    other => return Err(other_error(format!("Unknown auction role: {other}"))),
                }
            }

            let mut stmt =
                conn.prepare("SELECT role, COUNT(*) FROM bid_roles WHERE address = ?1 GROUP BY role")?;
            let mut rows = stmt.query(params![key])?;
            while let Some(row) = rows.next()? {
                let role: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                let count = count as usize;
                match role.as_str() {
                    "bidder" => breakdown.bids_as_bidder = count,
                    "token_owner" => breakdown.bids_as_token_owner = count,
                    other => return Err(other_error(format!("Unknown bid role: {other}"))),
                }
            }

            Ok(AddressLookup {
                address,
                auctions,
                bids,
                breakdown,
            })
        })
        .await?;
    Ok(lookup)
}

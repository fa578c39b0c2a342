use crate::codec::{self, DecodeError};
use crate::crypto::{self, Address, Hash, HASH_LEN, PUBLIC_KEY_LEN};
use crate::transaction::Transaction;

/// Header of a block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    /// Hash of the previous block in the chain
    pub prev_hash: Hash,

    /// Required number of leading zero bits on the block hash
    pub difficulty: u8,

    /// Nonce searched by the miner to satisfy the difficulty
    pub nonce: u64,

    /// Public key the block reward and fees are credited to
    pub miner_pub_key: Address,

    /// Miner's self-proof: signature of the miner public key by the
    /// matching private key
    pub miner_proof: Vec<u8>,

    /// Carried opaquely; never recomputed during verification
    pub chain_state_merkle_hash: Hash,

    /// Carried opaquely; never recomputed during verification
    pub transactions_merkle_hash: Hash,
}

impl BlockHeader {
    /// Encodes the header in wire order
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&self.prev_hash.0);
        bytes.push(self.difficulty);
        bytes.extend_from_slice(&self.nonce.to_be_bytes());
        bytes.extend_from_slice(&self.miner_pub_key.0);
        codec::encode_bit_string(&mut bytes, &self.miner_proof);
        bytes.extend_from_slice(&self.chain_state_merkle_hash.0);
        bytes.extend_from_slice(&self.transactions_merkle_hash.0);
        bytes
    }

    /// Decodes a header off the front of the input
    pub fn decode(input: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let (prev_hash, rest) = codec::take_array::<HASH_LEN>(input)?;
        let (difficulty, rest) = codec::take_u8(rest)?;
        let (nonce, rest) = codec::take_u64(rest)?;
        let (miner_pub_key, rest) = codec::take_array::<PUBLIC_KEY_LEN>(rest)?;
        let (miner_proof, rest) = codec::decode_bit_string(rest)?;
        let (chain_state_merkle_hash, rest) = codec::take_array::<HASH_LEN>(rest)?;
        let (transactions_merkle_hash, rest) = codec::take_array::<HASH_LEN>(rest)?;

        let header = BlockHeader {
            prev_hash: Hash(prev_hash),
            difficulty,
            nonce,
            miner_pub_key: Address(miner_pub_key),
            miner_proof,
            chain_state_merkle_hash: Hash(chain_state_merkle_hash),
            transactions_merkle_hash: Hash(transactions_merkle_hash),
        };

        Ok((header, rest))
    }
}

/// Ordered transactions of a block
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockBody {
    pub transactions: Vec<Transaction>,
}

impl BlockBody {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        codec::encode_list(&mut bytes, &self.transactions, |tx, out| {
            out.extend_from_slice(&tx.to_bytes());
        });
        bytes
    }

    pub fn decode(input: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let (transactions, rest) = codec::decode_list(input, Transaction::decode)?;
        Ok((BlockBody { transactions }, rest))
    }
}

/// A block: header plus transaction body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub body: BlockBody,
}

impl Block {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.header.to_bytes();
        bytes.extend_from_slice(&self.body.to_bytes());
        bytes
    }

    pub fn decode(input: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let (header, rest) = BlockHeader::decode(input)?;
        let (body, rest) = BlockBody::decode(rest)?;

        Ok((Block { header, body }, rest))
    }

    /// The block's identity: `SHA256(encode(header) ‖ encode(body))`
    pub fn hash(&self) -> Hash {
        crypto::sha256(&self.to_bytes())
    }
}

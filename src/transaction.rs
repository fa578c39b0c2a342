use crate::codec::{self, DecodeError};
use crate::crypto::{self, Address, Hash, KeyPair, PUBLIC_KEY_LEN};

/// Wire size of an encoded transaction body
pub const TRANSACTION_BODY_LEN: usize = 2 * PUBLIC_KEY_LEN + 3 * 8;

/// The signed payload of a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionBody {
    /// Sender's public key
    pub from: Address,

    /// Recipient's public key
    pub to: Address,

    /// Amount being transferred
    pub amount: u64,

    /// Sender-chosen nonce to prevent replay attacks
    pub nonce: u64,

    /// Fee paid to the miner of the including block
    pub transaction_fee: u64,
}

impl TransactionBody {
    /// Encodes the body: `from ‖ to ‖ amount ‖ nonce ‖ fee`, big-endian
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(TRANSACTION_BODY_LEN);
        bytes.extend_from_slice(&self.from.0);
        bytes.extend_from_slice(&self.to.0);
        bytes.extend_from_slice(&self.amount.to_be_bytes());
        bytes.extend_from_slice(&self.nonce.to_be_bytes());
        bytes.extend_from_slice(&self.transaction_fee.to_be_bytes());
        bytes
    }

    /// Decodes a body off the front of the input
    pub fn decode(input: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let (from, rest) = codec::take_array::<PUBLIC_KEY_LEN>(input)?;
        let (to, rest) = codec::take_array::<PUBLIC_KEY_LEN>(rest)?;
        let (amount, rest) = codec::take_u64(rest)?;
        let (nonce, rest) = codec::take_u64(rest)?;
        let (transaction_fee, rest) = codec::take_u64(rest)?;

        let body = TransactionBody {
            from: Address(from),
            to: Address(to),
            amount,
            nonce,
            transaction_fee,
        };

        Ok((body, rest))
    }
}

/// A signed transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub body: TransactionBody,

    /// ECDSA signature over `SHA256(encode(body))` by the sender's key
    pub signature: Vec<u8>,
}

impl Transaction {
    /// Builds and signs a transfer from the given keypair
    pub fn create(keypair: &KeyPair, to: Address, amount: u64, transaction_fee: u64, nonce: u64) -> Self {
        let body = TransactionBody {
            from: *keypair.address(),
            to,
            amount,
            nonce,
            transaction_fee,
        };

        let signature = keypair.sign(&body.to_bytes());

        Transaction { body, signature }
    }

    /// Encodes the transaction: body followed by the bit-length-prefixed
    /// signature
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.body.to_bytes();
        codec::encode_bit_string(&mut bytes, &self.signature);
        bytes
    }

    /// Decodes a transaction off the front of the input
    pub fn decode(input: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let (body, rest) = TransactionBody::decode(input)?;
        let (signature, rest) = codec::decode_bit_string(rest)?;

        Ok((Transaction { body, signature }, rest))
    }

    /// The transaction's identity: `SHA256(encode(transaction))`
    pub fn hash(&self) -> Hash {
        crypto::sha256(&self.to_bytes())
    }

    /// Checks the sender's signature over the body
    pub fn verify_signature(&self) -> bool {
        crypto::verify_signature(&self.body.from, &self.body.to_bytes(), &self.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_transaction_roundtrip() {
        let sender = KeyPair::generate();
        let recipient = KeyPair::generate();

        let transaction = Transaction::create(&sender, *recipient.address(), 10, 1, 7);
        assert_eq!(transaction.body.amount, 10);
        assert_eq!(transaction.body.transaction_fee, 1);
        assert_eq!(transaction.body.nonce, 7);
        assert!(transaction.verify_signature());

        let encoded = transaction.to_bytes();
        let (decoded, rest) = Transaction::decode(&encoded).unwrap();

        assert_eq!(decoded, transaction);
        assert!(rest.is_empty());
        assert_eq!(decoded.hash(), transaction.hash());
    }

    #[test]
    fn test_body_encoding_layout() {
        let sender = KeyPair::generate();
        let recipient = KeyPair::generate();

        let body = TransactionBody {
            from: *sender.address(),
            to: *recipient.address(),
            amount: 0x0102,
            nonce: 3,
            transaction_fee: 4,
        };

        let bytes = body.to_bytes();
        assert_eq!(bytes.len(), TRANSACTION_BODY_LEN);
        assert_eq!(&bytes[..PUBLIC_KEY_LEN], sender.address().as_bytes());
        assert_eq!(
            &bytes[PUBLIC_KEY_LEN..2 * PUBLIC_KEY_LEN],
            recipient.address().as_bytes()
        );
        assert_eq!(
            bytes[2 * PUBLIC_KEY_LEN..2 * PUBLIC_KEY_LEN + 8],
            0x0102u64.to_be_bytes()
        );
    }

    #[test]
    fn test_tampered_body_fails_verification() {
        let sender = KeyPair::generate();
        let recipient = KeyPair::generate();

        let mut transaction = Transaction::create(&sender, *recipient.address(), 10, 1, 7);
        transaction.body.amount = 1_000_000;

        assert!(!transaction.verify_signature());
    }

    #[test]
    fn test_decode_truncated() {
        let sender = KeyPair::generate();
        let recipient = KeyPair::generate();

        let encoded = Transaction::create(&sender, *recipient.address(), 5, 0, 1).to_bytes();
        assert!(Transaction::decode(&encoded[..encoded.len() - 1]).is_err());
        assert!(Transaction::decode(&encoded[..TRANSACTION_BODY_LEN + 1]).is_err());
        assert!(Transaction::decode(&[]).is_err());
    }

    #[test]
    fn test_signature_changes_hash() {
        let sender = KeyPair::generate();
        let recipient = KeyPair::generate();

        let transaction = Transaction::create(&sender, *recipient.address(), 5, 0, 1);
        let mut other = transaction.clone();
        other.signature[4] ^= 0x01;

        assert_ne!(transaction.hash(), other.hash());
    }
}

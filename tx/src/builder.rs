//! Assemble, sign, and encode transactions.

use crate::{
    gas,
    price::GasPrice,
    proto::{
        mode_info, Any, AuthInfo, Coin, Fee, ModeInfo, Msg, PubKey, SignDoc, SignerInfo, TxBody,
        TxRaw, SECP256K1_PUBKEY_TYPE_URL, SIGN_MODE_DIRECT,
    },
    Error,
};
use bytes::Bytes;
use prost::Message;
use std::sync::Arc;
use swarm_keys::PrivateKey;

/// Configuration for the [Builder].
#[derive(Clone, Debug)]
pub struct Config {
    /// Chain identifier included in the sign document.
    pub chain_id: String,

    /// Denomination fees are paid in.
    pub denom: String,

    /// Gas charged per encoded message byte.
    pub gas_per_byte: u64,

    /// Gas charged per transaction regardless of size.
    pub base_gas: u64,

    /// Multiplier applied to the estimate (disabled if not positive).
    pub gas_adjustment: f64,
}

/// A signed transaction ready for broadcast.
#[derive(Clone, Debug)]
pub struct Signed {
    /// Encoded `TxRaw`.
    pub bytes: Bytes,
    /// Uppercase hex hash of `bytes`.
    pub hash: String,
    pub sequence: u64,
    pub gas: u64,
    pub fee: u64,
}

/// Builds signed transactions for any actor.
#[derive(Clone)]
pub struct Builder {
    cfg: Arc<Config>,
    price: GasPrice,
}

impl Builder {
    pub fn new(cfg: Config, price: GasPrice) -> Self {
        Self {
            cfg: Arc::new(cfg),
            price,
        }
    }

    /// Gas limit for a batch of messages.
    pub fn gas(&self, msgs: &[Any]) -> Result<u64, Error> {
        let size: usize = msgs.iter().map(|msg| msg.encoded_len()).sum();
        let size = i64::try_from(size)
            .map_err(|_| Error::Validation(format!("payload too large: {size} bytes")))?;
        let gas = gas::estimate(size, self.cfg.gas_per_byte, self.cfg.base_gas)?;
        Ok(gas::adjust(gas, self.cfg.gas_adjustment))
    }

    /// Sign `msgs` as `key` at the given account number and sequence.
    ///
    /// The fee uses the gas price observed at the time of the call.
    pub fn build(
        &self,
        key: &PrivateKey,
        msgs: &[Any],
        account_number: u64,
        sequence: u64,
    ) -> Result<Signed, Error> {
        if msgs.is_empty() {
            return Err(Error::Validation("no messages".into()));
        }
        let gas = self.gas(msgs)?;
        let fee = gas::fee(gas, self.price.get())?;

        let body = TxBody {
            messages: msgs.to_vec(),
            memo: String::new(),
            timeout_height: 0,
        };
        let public_key = PubKey {
            key: key.public_key().to_bytes().to_vec(),
        };
        let auth_info = AuthInfo {
            signer_infos: vec![SignerInfo {
                public_key: Some(Any {
                    type_url: SECP256K1_PUBKEY_TYPE_URL.to_string(),
                    value: public_key.encode_to_vec(),
                }),
                mode_info: Some(ModeInfo {
                    sum: Some(mode_info::Sum::Single(mode_info::Single {
                        mode: SIGN_MODE_DIRECT,
                    })),
                }),
                sequence,
            }],
            fee: Some(Fee {
                amount: vec![Coin::new(&self.cfg.denom, fee)],
                gas_limit: gas,
                payer: String::new(),
                granter: String::new(),
            }),
        };

        let body_bytes = body.encode_to_vec();
        let auth_info_bytes = auth_info.encode_to_vec();
        let sign_doc = SignDoc {
            body_bytes: body_bytes.clone(),
            auth_info_bytes: auth_info_bytes.clone(),
            chain_id: self.cfg.chain_id.clone(),
            account_number,
        };
        let signature = key.sign(&sign_doc.encode_to_vec());

        let raw = TxRaw {
            body_bytes,
            auth_info_bytes,
            signatures: vec![signature.to_vec()],
        };
        let bytes = Bytes::from(raw.encode_to_vec());
        Ok(Signed {
            hash: swarm_chain::tx_hash(&bytes),
            bytes,
            sequence,
            gas,
            fee,
        })
    }

    /// Convenience for building a single typed message.
    pub fn build_one<M: Msg>(
        &self,
        key: &PrivateKey,
        msg: &M,
        account_number: u64,
        sequence: u64,
    ) -> Result<Signed, Error> {
        self.build(key, &[msg.to_any()], account_number, sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msgs::bank::MsgSend;
    use rand::{rngs::StdRng, SeedableRng};

    fn builder(price: f64, adjustment: f64) -> Builder {
        Builder::new(
            Config {
                chain_id: "testnet".into(),
                denom: "uallo".into(),
                gas_per_byte: 10,
                base_gas: 100_000,
                gas_adjustment: adjustment,
            },
            GasPrice::new(price),
        )
    }

    fn send() -> MsgSend {
        MsgSend {
            from_address: "allo1from".into(),
            to_address: "allo1to".into(),
            amount: vec![Coin::new("uallo", 5)],
        }
    }

    #[test]
    fn test_gas_uses_encoded_size() {
        let builder = builder(1.0, 0.0);
        let any = send().to_any();
        let size = any.encoded_len() as u64;
        assert_eq!(builder.gas(&[any.clone()]).unwrap(), 100_000 + 10 * size);
        assert_eq!(
            builder.gas(&[any.clone(), any]).unwrap(),
            100_000 + 20 * size
        );
    }

    #[test]
    fn test_build_envelope() {
        let key = PrivateKey::generate(&mut StdRng::seed_from_u64(0));
        let builder = builder(0.5, 1.5);
        let signed = builder.build_one(&key, &send(), 9, 5).unwrap();

        let raw = TxRaw::decode(signed.bytes.as_ref()).unwrap();
        let body = TxBody::decode(raw.body_bytes.as_slice()).unwrap();
        assert_eq!(body.messages, vec![send().to_any()]);
        assert_eq!(body.timeout_height, 0);
        assert!(body.memo.is_empty());

        let auth_info = AuthInfo::decode(raw.auth_info_bytes.as_slice()).unwrap();
        let signer = &auth_info.signer_infos[0];
        assert_eq!(signer.sequence, 5);
        assert_eq!(TxRaw::sequence(&signed.bytes).unwrap(), 5);
        let fee = auth_info.fee.unwrap();
        assert_eq!(fee.gas_limit, signed.gas);
        assert_eq!(fee.amount, vec![Coin::new("uallo", signed.fee)]);
        assert_eq!(signed.fee, (signed.gas as f64 * 0.5).round() as u64);

        // Adjustment applied on top of the estimate
        assert_eq!(builder.gas(&[]).unwrap(), 150_000);

        // Signature covers the sign document
        let sign_doc = SignDoc {
            body_bytes: raw.body_bytes.clone(),
            auth_info_bytes: raw.auth_info_bytes.clone(),
            chain_id: "testnet".into(),
            account_number: 9,
        };
        assert!(key
            .public_key()
            .verify(&sign_doc.encode_to_vec(), &raw.signatures[0]));
        assert_eq!(signed.hash, swarm_chain::tx_hash(&signed.bytes));
    }

    #[test]
    fn test_build_reads_current_price() {
        let key = PrivateKey::generate(&mut StdRng::seed_from_u64(1));
        let price = GasPrice::new(1.0);
        let builder = Builder::new(
            Config {
                chain_id: "testnet".into(),
                denom: "uallo".into(),
                gas_per_byte: 1,
                base_gas: 1_000,
                gas_adjustment: 0.0,
            },
            price.clone(),
        );
        let first = builder.build_one(&key, &send(), 0, 0).unwrap();
        price.set(2.0);
        let second = builder.build_one(&key, &send(), 0, 0).unwrap();
        assert_eq!(second.fee, first.fee * 2);
    }

    #[test]
    fn test_build_rejects() {
        let key = PrivateKey::generate(&mut StdRng::seed_from_u64(2));
        assert!(matches!(
            builder(1.0, 0.0).build(&key, &[], 0, 0),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            builder(0.0, 0.0).build_one(&key, &send(), 0, 0),
            Err(Error::Validation(_))
        ));
    }
}

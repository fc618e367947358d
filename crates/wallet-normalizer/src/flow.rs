//! Value-flow rules shared by every chain.
//!
//! Given who paid in and who got paid, decide the direction, the amount and
//! the counterparty of a transaction from the point of view of one address.

use rust_decimal::Decimal;
use wallet_types::UtxoEntry;

/// Direction, amount and counterparty as seen from the queried address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flow {
	pub direction: bool,
	pub amount: Decimal,
	/// `None` when no foreign address took part.
	pub counterparty: Option<String>,
}

impl Flow {
	fn self_transfer(fee: Decimal) -> Self {
		Self {
			direction: false,
			amount: fee,
			counterparty: None,
		}
	}
}

/// UTXO model: sums what the address put in and took out.
///
/// A transaction whose inputs and outputs all belong to the address is a
/// self-transfer and only costs the fee. Otherwise it is incoming when the
/// address took out more than it put in.
pub fn utxo_flow<F>(
	inputs: &[UtxoEntry],
	outputs: &[UtxoEntry],
	fee: Decimal,
	self_address: &str,
	matches: F,
) -> Flow
where
	F: Fn(&str, &str) -> bool,
{
	let owned = |entry: &UtxoEntry| {
		entry
			.address
			.as_deref()
			.is_some_and(|address| matches(address, self_address))
	};

	let has_entries = !inputs.is_empty() || !outputs.is_empty();
	if has_entries && inputs.iter().all(owned) && outputs.iter().all(owned) {
		return Flow::self_transfer(fee);
	}

	let value_in: Decimal = inputs.iter().filter(|e| owned(e)).map(|e| e.value).sum();
	let value_out: Decimal = outputs.iter().filter(|e| owned(e)).map(|e| e.value).sum();

	let first_foreign = |entries: &[UtxoEntry]| {
		entries
			.iter()
			.filter(|e| !owned(e))
			.find_map(|e| e.address.clone())
			.filter(|a| !a.is_empty())
	};

	if value_in < value_out {
		Flow {
			direction: true,
			amount: value_out - value_in,
			counterparty: first_foreign(inputs),
		}
	} else {
		Flow {
			direction: false,
			amount: (value_in - value_out - fee).max(Decimal::ZERO),
			counterparty: first_foreign(outputs),
		}
	}
}

/// Account model: one sender, one recipient, one value.
pub fn account_flow<F>(
	sender: &str,
	recipient: &str,
	value: Decimal,
	fee: Decimal,
	self_address: &str,
	matches: F,
) -> Flow
where
	F: Fn(&str, &str) -> bool,
{
	let from_self = matches(sender, self_address);
	let to_self = matches(recipient, self_address);

	if from_self && to_self {
		return Flow::self_transfer(fee);
	}

	let counterparty = if to_self { sender } else { recipient };

	Flow {
		direction: to_self,
		amount: value,
		counterparty: Some(counterparty.to_string()).filter(|a| !a.is_empty()),
	}
}

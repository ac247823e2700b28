//! Manual payment recording.

use dub_core::{PaymentDetails, PaymentMethod, PaymentStatus};
use dub_server::services::LedgerService;

use super::{CliError, parse_external_id, store};

/// Raw payment arguments as given on the command line.
#[derive(Debug)]
pub struct PaymentArgs<'a> {
    pub method: &'a str,
    pub reference: &'a str,
    pub status: &'a str,
    pub amount_cents: u64,
    pub payer_email: Option<String>,
}

impl PaymentArgs<'_> {
    fn parse(self) -> Result<PaymentDetails, CliError> {
        let method: PaymentMethod = self
            .method
            .to_ascii_lowercase()
            .parse()
            .map_err(|e: dub_core::ParseEnumError| CliError::InvalidArgument(e.to_string()))?;
        let status: PaymentStatus = self
            .status
            .to_ascii_lowercase()
            .parse()
            .map_err(|e: dub_core::ParseEnumError| CliError::InvalidArgument(e.to_string()))?;
        let reference = self.reference.trim();
        if reference.is_empty() {
            return Err(CliError::InvalidArgument(
                "payment reference must not be empty".to_owned(),
            ));
        }

        Ok(PaymentDetails {
            method,
            reference: reference.to_owned(),
            status,
            paid_cents: self.amount_cents,
            payer_email: self.payer_email,
        })
    }
}

/// Append a payment entry to an account's ledger. The balance is untouched.
///
/// # Errors
///
/// Returns an error for invalid arguments, an unknown account, or a storage
/// failure.
pub async fn record(
    external_id: &str,
    args: PaymentArgs<'_>,
    description: &str,
) -> Result<(), CliError> {
    let id = parse_external_id(external_id)?;
    let payment = args.parse()?;
    let store = store().await?;

    LedgerService::new(&store)
        .record_payment(&id, payment, description)
        .await?;
    tracing::info!(external_id = %id, "Payment recorded");
    Ok(())
}

//! # Customer Directory
//!
//! Creating, finding and retiring customers of both channels.
//!
//! ## Channel Differences
//! ```text
//! ┌───────────────┬──────────────────────────────┬───────────────────────────┐
//! │               │ wholesale                    │ regular                   │
//! ├───────────────┼──────────────────────────────┼───────────────────────────┤
//! │ phone         │ unique, the lookup key       │ unique among active       │
//! │ create        │ get-or-create by phone       │ reject duplicate phone    │
//! │ delete        │ deactivate (row kept)        │ hard delete, only while   │
//! │               │                              │ nothing references it     │
//! └───────────────┴──────────────────────────────┴───────────────────────────┘
//! ```
//!
//! The balance shown for a customer is resolved through the channel's
//! balance strategy, never read blindly from the cached column.

use argent_core::validation::{
    validate_customer_name, validate_email, validate_gst_number, validate_phone,
};
use argent_core::{BalanceStrategy, Channel, CoreError, Customer, Money, ValidationError};
use argent_db::{CustomerFilter, Database, DbError, DbResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::BalanceSettings;

// =============================================================================
// Inputs
// =============================================================================

/// Contact details for a new customer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub gst_number: Option<String>,
}

impl NewCustomer {
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        NewCustomer {
            name: name.into(),
            phone: phone.into(),
            ..Default::default()
        }
    }
}

/// Partial update of a customer's contact details. `None` leaves a field
/// unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub gst_number: Option<String>,
    pub is_active: Option<bool>,
}

// =============================================================================
// Outputs
// =============================================================================

/// A customer with the balance of record resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerView {
    pub customer: Customer,
    pub balance: Money,
}

/// One page of a customer search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerPage {
    pub customers: Vec<CustomerView>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

/// What [`CustomerDirectory::delete`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deactivated,
    Deleted,
}

// =============================================================================
// Directory
// =============================================================================

#[derive(Debug, Clone)]
pub struct CustomerDirectory {
    db: Database,
    strategies: BalanceSettings,
}

impl CustomerDirectory {
    pub fn new(db: Database, strategies: BalanceSettings) -> Self {
        CustomerDirectory { db, strategies }
    }

    /// Finds the wholesale customer with this phone, creating them if needed.
    ///
    /// Returns the customer and whether they were created.
    pub async fn get_or_create_wholesale(&self, input: NewCustomer) -> DbResult<(Customer, bool)> {
        let customer = build_customer(Channel::Wholesale, input)?;
        let customers = self.db.customers();

        let existing = customers.find_by_phone(Channel::Wholesale, &customer.phone).await?;
        if let Some(existing) = existing {
            return Ok((existing, false));
        }

        match customers.insert(&customer).await {
            Ok(()) => {
                info!(
                    customer_id = %customer.id,
                    phone = %customer.phone,
                    "Wholesale customer created"
                );
                Ok((customer, true))
            }
            // Lost a race with another create for the same phone
            Err(DbError::UniqueViolation { .. }) => {
                let existing = customers
                    .find_by_phone(Channel::Wholesale, &customer.phone)
                    .await?
                    .ok_or_else(|| {
                        DbError::Internal("customer vanished after conflict".to_string())
                    })?;
                Ok((existing, false))
            }
            Err(err) => Err(err),
        }
    }

    /// Creates a regular customer. An active customer with the same phone is
    /// a conflict.
    pub async fn create_regular(&self, input: NewCustomer) -> DbResult<Customer> {
        let customer = build_customer(Channel::Regular, input)?;
        self.ensure_phone_free(Channel::Regular, &customer.phone, None).await?;

        self.db.customers().insert(&customer).await?;
        info!(customer_id = %customer.id, "Regular customer created");
        Ok(customer)
    }

    /// Changes contact details. The balance can't be changed here.
    pub async fn update(&self, id: &str, changes: CustomerUpdate) -> DbResult<Customer> {
        let customers = self.db.customers();
        let mut customer = customers
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::CustomerNotFound(id.to_string()))?;

        if let Some(name) = changes.name {
            validate_customer_name(&name)?;
            customer.name = name.trim().to_string();
        }
        if let Some(phone) = changes.phone {
            let phone = validate_phone(&phone)?;
            if phone != customer.phone {
                self.ensure_phone_free(customer.channel, &phone, Some(&customer.id)).await?;
            }
            customer.phone = phone;
        }
        if let Some(email) = changes.email {
            customer.email = validate_email(Some(&email))?;
        }
        if let Some(address) = changes.address {
            customer.address = non_empty(&address);
        }
        if let Some(gst) = changes.gst_number {
            customer.gst_number = validate_gst_number(Some(&gst))?;
        }
        if let Some(active) = changes.is_active {
            customer.is_active = active;
        }

        customers.update(&customer).await?;
        Ok(customer)
    }

    /// A customer with their resolved balance.
    pub async fn get(&self, id: &str) -> DbResult<CustomerView> {
        let customer = self
            .db
            .customers()
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::CustomerNotFound(id.to_string()))?;
        self.view(customer).await
    }

    /// Searches one channel's customers by name or phone.
    pub async fn search(&self, filter: &CustomerFilter) -> DbResult<CustomerPage> {
        let (found, total) = self.db.customers().search(filter).await?;

        let mut customers = Vec::with_capacity(found.len());
        for customer in found {
            customers.push(self.view(customer).await?);
        }

        Ok(CustomerPage {
            customers,
            total,
            page: filter.page.max(1),
            limit: filter.limit.clamp(1, argent_db::MAX_PAGE_SIZE),
        })
    }

    /// Retires a customer: wholesale customers are deactivated, regular
    /// customers are deleted outright.
    ///
    /// ## Errors
    /// A regular customer who still has sales or ledger entries can't be
    /// deleted (`ForeignKeyViolation`).
    pub async fn delete(&self, id: &str) -> DbResult<DeleteOutcome> {
        let customers = self.db.customers();
        let customer = customers
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::CustomerNotFound(id.to_string()))?;

        match customer.channel {
            Channel::Wholesale => {
                customers.deactivate(id).await?;
                info!(customer_id = id, "Wholesale customer deactivated");
                Ok(DeleteOutcome::Deactivated)
            }
            Channel::Regular => match customers.delete(id).await {
                Ok(()) => {
                    info!(customer_id = id, "Regular customer deleted");
                    Ok(DeleteOutcome::Deleted)
                }
                Err(err @ DbError::ForeignKeyViolation { .. }) => {
                    warn!(customer_id = id, "Customer still referenced, not deleted");
                    Err(err)
                }
                Err(err) => Err(err),
            },
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn view(&self, customer: Customer) -> DbResult<CustomerView> {
        let balance = match self.strategies.strategy_for(customer.channel) {
            BalanceStrategy::CachedField => customer.balance,
            BalanceStrategy::DerivedSum => self.db.ledger().balance_by_sum(&customer.id).await?,
        };
        Ok(CustomerView { customer, balance })
    }

    async fn ensure_phone_free(
        &self,
        channel: Channel,
        phone: &str,
        except: Option<&str>,
    ) -> DbResult<()> {
        let existing = self.db.customers().find_by_phone(channel, phone).await?;
        match existing {
            Some(other) if other.is_active && Some(other.id.as_str()) != except => {
                Err(ValidationError::Duplicate {
                    field: "phone".to_string(),
                    value: phone.to_string(),
                }
                .into())
            }
            _ => Ok(()),
        }
    }
}

fn build_customer(channel: Channel, input: NewCustomer) -> DbResult<Customer> {
    validate_customer_name(&input.name)?;
    let phone = validate_phone(&input.phone)?;
    let now = Utc::now();

    Ok(Customer {
        id: Uuid::new_v4().to_string(),
        channel,
        name: input.name.trim().to_string(),
        phone,
        email: validate_email(input.email.as_deref())?,
        address: input.address.as_deref().and_then(non_empty),
        gst_number: validate_gst_number(input.gst_number.as_deref())?,
        balance: Money::zero(),
        is_active: true,
        created_at: now,
        updated_at: now,
    })
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

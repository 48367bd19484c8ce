//! DynamoDB-backed [`TableBackend`] (enabled by the `aws` feature).
//!
//! Conditional writes are expressed as `attribute_exists`/`attribute_not_exists` condition
//! expressions on the partition key, so DynamoDB itself arbitrates concurrent creates.

// crates.io
use aws_sdk_dynamodb::{Client, error::DisplayErrorContext, types::AttributeValue};
use serde_json::{Number, Value};
// self
use crate::{
	_prelude::*,
	config::BrokerConfig,
	store::{
		AttributeFilter, ConditionalOutcome, Item, ItemKey, Page, PageToken, Precondition,
		StoreError, StoreFuture, Table, TableBackend,
	},
};

type AttributeMap = HashMap<String, AttributeValue>;

/// Table backend talking to DynamoDB through the AWS SDK.
#[derive(Clone, Debug)]
pub struct DynamoStore {
	client: Client,
}
impl DynamoStore {
	/// Wraps an already configured client.
	pub fn new(client: Client) -> Self {
		Self { client }
	}

	/// Connects with the AWS configuration derived from `config`.
	pub async fn connect(config: &BrokerConfig) -> Self {
		Self::new(Client::new(&config.aws_sdk_config().await))
	}

	fn page(table: Table, items: &[AttributeMap], last: Option<&AttributeMap>) -> Result<Page, StoreError> {
		let items = items.iter().map(from_attributes).collect::<Result<Vec<_>, _>>()?;
		let next = last.map(|key| from_attributes(key).and_then(|key| ItemKey::of(table, &key)))
			.transpose()?
			.map(PageToken);

		Ok(Page { items, next })
	}
}
impl TableBackend for DynamoStore {
	fn scan<'a>(
		&'a self,
		table: Table,
		filter: Option<&'a AttributeFilter>,
		start: Option<&'a PageToken>,
	) -> StoreFuture<'a, Page> {
		Box::pin(async move {
			let mut request = self
				.client
				.scan()
				.table_name(table.name())
				.set_exclusive_start_key(start.map(|PageToken(key)| key_attributes(table, key)));

			if let Some(filter) = filter {
				request = request
					.filter_expression("#f = :f")
					.expression_attribute_names("#f", &filter.attribute)
					.expression_attribute_values(":f", AttributeValue::S(filter.value.clone()));
			}

			let output = request.send().await.map_err(|e| backend(table, "Scan", e))?;

			Self::page(table, output.items(), output.last_evaluated_key())
		})
	}

	fn query<'a>(
		&'a self,
		table: Table,
		partition: &'a str,
		start: Option<&'a PageToken>,
	) -> StoreFuture<'a, Page> {
		Box::pin(async move {
			let output = self
				.client
				.query()
				.table_name(table.name())
				.key_condition_expression("#pk = :pk")
				.expression_attribute_names("#pk", table.partition_key())
				.expression_attribute_values(":pk", AttributeValue::S(partition.to_owned()))
				.set_exclusive_start_key(start.map(|PageToken(key)| key_attributes(table, key)))
				.send()
				.await
				.map_err(|e| backend(table, "Query", e))?;

			Self::page(table, output.items(), output.last_evaluated_key())
		})
	}

	fn get<'a>(&'a self, table: Table, key: &'a ItemKey) -> StoreFuture<'a, Option<Item>> {
		Box::pin(async move {
			let output = self
				.client
				.get_item()
				.table_name(table.name())
				.set_key(Some(key_attributes(table, key)))
				.consistent_read(true)
				.send()
				.await
				.map_err(|e| backend(table, "GetItem", e))?;

			output.item().map(from_attributes).transpose()
		})
	}

	fn put(
		&self,
		table: Table,
		item: Item,
		precondition: Precondition,
	) -> StoreFuture<'_, ConditionalOutcome> {
		Box::pin(async move {
			let mut request =
				self.client.put_item().table_name(table.name()).set_item(Some(to_attributes(item)?));

			if let Some(condition) = condition_expression(precondition) {
				request = request
					.condition_expression(condition)
					.expression_attribute_names("#pk", table.partition_key());
			}

			match request.send().await {
				Ok(_) => Ok(ConditionalOutcome::Applied),
				Err(e)
					if e.as_service_error()
						.is_some_and(|e| e.is_conditional_check_failed_exception()) =>
					Ok(ConditionalOutcome::ConditionFailed),
				Err(e) => Err(backend(table, "PutItem", e)),
			}
		})
	}

	fn delete<'a>(
		&'a self,
		table: Table,
		key: &'a ItemKey,
		precondition: Precondition,
	) -> StoreFuture<'a, ConditionalOutcome> {
		Box::pin(async move {
			let mut request = self
				.client
				.delete_item()
				.table_name(table.name())
				.set_key(Some(key_attributes(table, key)));

			if let Some(condition) = condition_expression(precondition) {
				request = request
					.condition_expression(condition)
					.expression_attribute_names("#pk", table.partition_key());
			}

			match request.send().await {
				Ok(_) => Ok(ConditionalOutcome::Applied),
				Err(e)
					if e.as_service_error()
						.is_some_and(|e| e.is_conditional_check_failed_exception()) =>
					Ok(ConditionalOutcome::ConditionFailed),
				Err(e) => Err(backend(table, "DeleteItem", e)),
			}
		})
	}
}

fn condition_expression(precondition: Precondition) -> Option<&'static str> {
	match precondition {
		Precondition::None => None,
		Precondition::Absent => Some("attribute_not_exists(#pk)"),
		Precondition::Exists => Some("attribute_exists(#pk)"),
	}
}

fn backend<E>(table: Table, operation: &str, e: E) -> StoreError
where
	E: StdError,
{
	StoreError::Backend { message: format!("{operation} on {table} failed: {}", DisplayErrorContext(e)) }
}

fn key_attributes(table: Table, key: &ItemKey) -> AttributeMap {
	let mut attributes = AttributeMap::new();

	attributes.insert(table.partition_key().into(), AttributeValue::S(key.partition.clone()));

	if let (Some(name), Some(sort)) = (table.sort_key(), &key.sort) {
		attributes.insert(name.into(), AttributeValue::S(sort.clone()));
	}

	attributes
}

fn to_attributes(item: Item) -> Result<AttributeMap, StoreError> {
	item.into_iter().map(|(name, value)| Ok((name, to_attribute(value)?))).collect()
}

fn to_attribute(value: Value) -> Result<AttributeValue, StoreError> {
	Ok(match value {
		Value::Null => AttributeValue::Null(true),
		Value::Bool(flag) => AttributeValue::Bool(flag),
		Value::Number(number) => AttributeValue::N(number.to_string()),
		Value::String(text) => AttributeValue::S(text),
		Value::Array(values) =>
			AttributeValue::L(values.into_iter().map(to_attribute).collect::<Result<_, _>>()?),
		Value::Object(map) => AttributeValue::M(to_attributes(map)?),
	})
}

fn from_attributes(attributes: &AttributeMap) -> Result<Item, StoreError> {
	attributes.iter().map(|(name, value)| Ok((name.clone(), from_attribute(value)?))).collect()
}

fn from_attribute(value: &AttributeValue) -> Result<Value, StoreError> {
	Ok(match value {
		AttributeValue::Null(_) => Value::Null,
		AttributeValue::Bool(flag) => Value::Bool(*flag),
		AttributeValue::S(text) => Value::String(text.clone()),
		AttributeValue::N(number) => Value::Number(number.parse::<Number>().map_err(|e| {
			StoreError::Serialization { message: format!("Invalid DynamoDB number `{number}`: {e}") }
		})?),
		AttributeValue::L(values) =>
			Value::Array(values.iter().map(from_attribute).collect::<Result<_, _>>()?),
		AttributeValue::M(map) => Value::Object(from_attributes(map)?),
		other => {
			return Err(StoreError::Serialization {
				message: format!("Unsupported DynamoDB attribute type: {other:?}"),
			});
		},
	})
}

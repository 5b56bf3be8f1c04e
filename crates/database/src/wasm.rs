//! JavaScript API.
//!
//! Records, descriptors and results cross the boundary as plain JS objects via
//! `serde-wasm-bindgen`. Every call that queues work also schedules a drain of
//! the task queue on the microtask queue, so results arrive the way an
//! asynchronous store would deliver them.

use crate::binding::QueryBinding;
use crate::config::DatabaseConfig;
use crate::database::{Database, TableSubscription};
use crate::mutations::{Pending, Update};
use ripple_core::schema::StoreSchema;
use ripple_core::{Error, Record, Value};
use ripple_query::QueryDescriptor;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;
use wasm_bindgen::prelude::*;

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(JsValue::from)
}

fn from_js<T: DeserializeOwned>(value: JsValue) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value).map_err(JsValue::from)
}

fn js_error(err: Error) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}

/// `{ version?: number, tables: { [name]: "++id, field, ..." } }`
#[derive(Deserialize)]
struct SchemaDeclaration {
    #[serde(default = "first_version")]
    version: u32,
    tables: BTreeMap<String, String>,
}

fn first_version() -> u32 {
    1
}

impl SchemaDeclaration {
    fn build(&self) -> Result<StoreSchema, Error> {
        self.tables
            .iter()
            .try_fold(StoreSchema::new(self.version), |schema, (name, declaration)| {
                schema.declare(name, declaration)
            })
    }
}

/// Schedules a drain of the task queue after the current call returns.
fn drain_later(db: &Database) {
    let db = db.clone();
    wasm_bindgen_futures::spawn_local(async move {
        if let Err(err) = db.run_pending() {
            warn!(error = %err, "queued transaction failed");
        }
    });
}

fn settle<T: Serialize + 'static>(db: &Database, pending: Pending<T>) -> js_sys::Promise {
    let db = db.clone();
    wasm_bindgen_futures::future_to_promise(async move {
        let value = pending.resolve(&db).map_err(js_error)?;
        to_js(&value)
    })
}

/// The engine context.
#[wasm_bindgen(js_name = Database)]
pub struct JsDatabase {
    db: Database,
}

#[wasm_bindgen(js_class = Database)]
impl JsDatabase {
    /// Creates a database from a schema declaration and an optional config object.
    #[wasm_bindgen(constructor)]
    pub fn new(name: &str, schema: JsValue, config: JsValue) -> Result<JsDatabase, JsValue> {
        let declaration: SchemaDeclaration = from_js(schema)?;
        let schema = declaration.build().map_err(js_error)?;
        let config = if config.is_undefined() || config.is_null() {
            DatabaseConfig::default()
        } else {
            from_js(config)?
        };
        Ok(Self {
            db: Database::with_config(name, schema, config),
        })
    }

    #[wasm_bindgen(getter)]
    pub fn name(&self) -> String {
        self.db.name()
    }

    pub fn open(&self) -> Result<(), JsValue> {
        self.db.open().map_err(js_error)
    }

    #[wasm_bindgen(js_name = isOpen)]
    pub fn is_open(&self) -> bool {
        self.db.is_open()
    }

    pub fn close(&self) {
        self.db.close();
    }

    /// Binds a descriptor on a table to a live result.
    pub fn bind(&self, table: &str, descriptor: JsValue) -> Result<JsBinding, JsValue> {
        let descriptor = descriptor_from_js(descriptor)?;
        let binding = self.db.bind(table, descriptor);
        drain_later(&self.db);
        Ok(JsBinding {
            binding,
            db: self.db.clone(),
        })
    }

    /// Calls `callback(table)` after every commit touching `table`.
    #[wasm_bindgen(js_name = onTableChange)]
    pub fn on_table_change(&self, table: &str, callback: js_sys::Function) -> JsTableSubscription {
        let subscription = self.db.on_table_change(table, move |key| {
            if let Err(err) = callback.call1(&JsValue::NULL, &JsValue::from_str(key)) {
                warn!(table = key, error = ?err, "table change callback threw");
            }
        });
        JsTableSubscription { subscription }
    }

    pub fn put(&self, table: &str, record: JsValue) -> Result<js_sys::Promise, JsValue> {
        let record: Record = from_js(record)?;
        Ok(settle(&self.db, self.db.put(table, record)))
    }

    #[wasm_bindgen(js_name = bulkPut)]
    pub fn bulk_put(&self, table: &str, records: JsValue) -> Result<js_sys::Promise, JsValue> {
        let records: Vec<Record> = from_js(records)?;
        Ok(settle(&self.db, self.db.bulk_put(table, records)))
    }

    pub fn delete(&self, table: &str, key: JsValue) -> Result<js_sys::Promise, JsValue> {
        let key: Value = from_js(key)?;
        Ok(settle(&self.db, self.db.delete(table, key)))
    }

    #[wasm_bindgen(js_name = deleteByQuery)]
    pub fn delete_by_query(
        &self,
        table: &str,
        descriptor: JsValue,
    ) -> Result<js_sys::Promise, JsValue> {
        let descriptor = descriptor_from_js(descriptor)?;
        Ok(settle(&self.db, self.db.delete_by_query(table, descriptor)))
    }

    /// `update` is either a replacement object or a function `(record) => record`.
    #[wasm_bindgen(js_name = updateByQuery)]
    pub fn update_by_query(
        &self,
        table: &str,
        descriptor: JsValue,
        update: JsValue,
    ) -> Result<js_sys::Promise, JsValue> {
        let descriptor = descriptor_from_js(descriptor)?;
        let update = match update.dyn_into::<js_sys::Function>() {
            Ok(f) => Update::try_with(move |current| {
                to_js(&current)
                    .and_then(|arg| f.call1(&JsValue::NULL, &arg))
                    .and_then(from_js::<Record>)
                    .map_err(|err| {
                        Error::invalid_operation(format!("update function failed: {err:?}"))
                    })
            }),
            Err(value) => Update::Replace(from_js(value)?),
        };
        Ok(settle(&self.db, self.db.update_by_query(table, descriptor, update)))
    }

    #[wasm_bindgen(js_name = firstKey)]
    pub fn first_key(&self, table: &str, descriptor: JsValue) -> Result<js_sys::Promise, JsValue> {
        let descriptor = descriptor_from_js(descriptor)?;
        Ok(settle(&self.db, self.db.first_key(table, descriptor)))
    }

    pub fn query(&self, table: &str, descriptor: JsValue) -> Result<js_sys::Promise, JsValue> {
        let descriptor = descriptor_from_js(descriptor)?;
        Ok(settle(&self.db, self.db.query(table, descriptor)))
    }

    pub fn stats(&self) -> Result<JsValue, JsValue> {
        to_js(&self.db.stats())
    }

    #[wasm_bindgen(js_name = setMonitoring)]
    pub fn set_monitoring(&self, enabled: bool) {
        self.db.set_monitoring(enabled);
    }
}

fn descriptor_from_js(descriptor: JsValue) -> Result<QueryDescriptor, JsValue> {
    if descriptor.is_undefined() || descriptor.is_null() {
        Ok(QueryDescriptor::default())
    } else {
        from_js(descriptor)
    }
}

/// A live query result.
#[wasm_bindgen(js_name = Binding)]
pub struct JsBinding {
    binding: QueryBinding,
    db: Database,
}

#[wasm_bindgen(js_class = Binding)]
impl JsBinding {
    /// The current result, `undefined` until the first execution succeeds.
    #[wasm_bindgen(getter)]
    pub fn value(&self) -> Result<JsValue, JsValue> {
        match self.binding.value() {
            Some(value) => to_js(&value),
            None => Ok(JsValue::UNDEFINED),
        }
    }

    #[wasm_bindgen(getter, js_name = isBusy)]
    pub fn is_busy(&self) -> bool {
        self.binding.is_busy()
    }

    #[wasm_bindgen(getter)]
    pub fn version(&self) -> f64 {
        self.binding.version() as f64
    }

    #[wasm_bindgen(getter)]
    pub fn table(&self) -> String {
        self.binding.table()
    }

    /// Replaces the descriptor. Returns true if it differed and a re-execution was requested.
    #[wasm_bindgen(js_name = setDescriptor)]
    pub fn set_descriptor(&self, descriptor: JsValue) -> Result<bool, JsValue> {
        let requested = self.binding.set_descriptor(descriptor_from_js(descriptor)?).is_some();
        if requested {
            drain_later(&self.db);
        }
        Ok(requested)
    }

    /// Moves the binding to another table. Returns true if a re-execution was requested.
    #[wasm_bindgen(js_name = setTable)]
    pub fn set_table(&self, table: &str) -> bool {
        let requested = self.binding.set_table(table).is_some();
        if requested {
            drain_later(&self.db);
        }
        requested
    }

    /// Calls `callback(value)` with every new result. Returns the subscription id.
    pub fn subscribe(&self, callback: js_sys::Function) -> f64 {
        let id = self.binding.subscribe(move |value| {
            if let Err(err) = to_js(value).and_then(|js| callback.call1(&JsValue::NULL, &js)) {
                warn!(error = ?err, "binding subscriber threw");
            }
        });
        id as f64
    }

    pub fn unsubscribe(&self, id: f64) -> bool {
        self.binding.unsubscribe(id as u64)
    }

    pub fn close(&self) {
        self.binding.close();
    }
}

/// Guard of a raw table-change subscription.
#[wasm_bindgen(js_name = TableSubscription)]
pub struct JsTableSubscription {
    subscription: TableSubscription,
}

#[wasm_bindgen(js_class = TableSubscription)]
impl JsTableSubscription {
    pub fn unsubscribe(&mut self) -> bool {
        self.subscription.unsubscribe()
    }
}

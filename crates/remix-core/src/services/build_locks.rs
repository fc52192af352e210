use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::ContentId;
use crate::errors::CacheError;

type LockMap = HashMap<ContentId, Arc<Mutex<()>>>;

/// Candados de construcción por identidad (single-flight).
///
/// Como mucho hay una recomputación en vuelo por `ContentId`. Quien llega
/// mientras otro construye espera a que termine y luego vuelve a mirar el
/// ledger. Las entradas del mapa se retiran cuando nadie más las usa.
#[derive(Clone, Default)]
pub struct BuildLocks {
  inner: Arc<StdMutex<LockMap>>,
}

/// Mientras viva, su identidad está "en construcción".
pub struct BuildGuard {
  id: ContentId,
  map: Arc<StdMutex<LockMap>>,
  // Se suelta después de `Drop::drop`, con la entrada del mapa ya retirada.
  _guard: OwnedMutexGuard<()>,
}

impl BuildLocks {
  pub fn new() -> Self {
    Self::default()
  }

  /// Toma el candado de `id`, esperando como mucho `wait`.
  pub async fn acquire(&self, id: &ContentId, wait: Duration) -> Result<BuildGuard, CacheError> {
    let lock = {
      let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
      Arc::clone(map.entry(id.clone()).or_default())
    };

    let guard = tokio::time::timeout(wait, lock.lock_owned())
      .await
      .map_err(|_| CacheError::BuildWaitTimeout { id: id.clone(), after: wait })?;

    Ok(BuildGuard { id: id.clone(), map: Arc::clone(&self.inner), _guard: guard })
  }

  /// Identidades con un candado tomado o esperado ahora mismo.
  pub fn in_flight(&self) -> usize {
    self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
  }
}

impl Drop for BuildGuard {
  fn drop(&mut self) {
    let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
    // Una referencia en el mapa y otra dentro de nuestro guard: nadie más espera.
    let idle = map.get(&self.id).is_some_and(|lock| Arc::strong_count(lock) <= 2);
    if idle {
      map.remove(&self.id);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::content_id;
  use std::sync::atomic::{AtomicUsize, Ordering};

  #[tokio::test]
  async fn entry_is_released_after_use() {
    let locks = BuildLocks::new();
    {
      let _g = locks.acquire(&content_id(1), Duration::from_secs(1)).await.unwrap();
      assert_eq!(locks.in_flight(), 1);
    }
    assert_eq!(locks.in_flight(), 0);
  }

  #[tokio::test]
  async fn second_waiter_times_out() {
    let locks = BuildLocks::new();
    let _held = locks.acquire(&content_id(1), Duration::from_secs(1)).await.unwrap();

    let err = locks.acquire(&content_id(1), Duration::from_millis(20)).await.err().unwrap();
    assert!(matches!(err, CacheError::BuildWaitTimeout { .. }));

    // Otra identidad no se ve afectada.
    assert!(locks.acquire(&content_id(2), Duration::from_millis(20)).await.is_ok());
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn holders_never_overlap() {
    let locks = BuildLocks::new();
    let active = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..8)
      .map(|_| {
        let locks = locks.clone();
        let active = Arc::clone(&active);
        let max_seen = Arc::clone(&max_seen);
        tokio::spawn(async move {
          let _g = locks.acquire(&content_id(7), Duration::from_secs(5)).await.unwrap();
          let now = active.fetch_add(1, Ordering::SeqCst) + 1;
          max_seen.fetch_max(now, Ordering::SeqCst);
          tokio::time::sleep(Duration::from_millis(5)).await;
          active.fetch_sub(1, Ordering::SeqCst);
        })
      })
      .collect();

    for t in tasks {
      t.await.unwrap();
    }

    assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    assert_eq!(locks.in_flight(), 0);
  }
}

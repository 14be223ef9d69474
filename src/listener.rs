//! Änderungs-Benachrichtigung: synchrone, geordnete Listener pro Knoten.
//!
//! Jeder veränderliche Knoten trägt eine [`ListenerList`]. Property-Setter
//! melden `(property, old, new)`, strukturelle Änderungen melden ein
//! eigenes Children-Event. Zustellung erfolgt synchron auf dem Thread des
//! Aufrufers, in Registrierungsreihenfolge.
//!
//! Ein Listener darf sich während der Zustellung selbst (oder andere
//! Listener) abmelden; abgemeldete Listener erhalten keine weiteren
//! Events. Nicht unterstützt: Properties desselben Knotens aus dem
//! Callback heraus erneut mutieren (der Knoten ist während des Setters
//! geborgt).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Handle einer registrierten Callback-Funktion.
pub type ListenerId = u64;

/// Callback-Typ für Knotenänderungen.
pub type ListenerFn = Box<dyn FnMut(&ChangeEvent)>;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Ein einzelnes Änderungs-Event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// Eine einzelne Property wurde mutiert.
    Property {
        /// Name der Property ("name", "documentation", "minOccurs", ...).
        property: &'static str,
        /// Wert vor der Mutation (String-Repräsentation).
        old: Option<String>,
        /// Wert nach der Mutation (String-Repräsentation).
        new: Option<String>,
    },
    /// Die Kindliste wurde strukturell verändert (add/insert/remove).
    Children,
}

impl ChangeEvent {
    /// Property-Name des Events; Children-Events melden "children".
    pub fn property(&self) -> &'static str {
        match self {
            Self::Property { property, .. } => property,
            Self::Children => "children",
        }
    }
}

/// Ein registrierter Listener.
///
/// `callback` wird während der Zustellung aus dem Slot genommen, damit
/// der Callback die Liste selbst mutieren darf (abmelden, neu anmelden).
struct ListenerEntry {
    id: ListenerId,
    callback: Option<ListenerFn>,
}

/// Geordnete Listener-Liste eines Knotens.
///
/// Clone teilt die Liste (Rc); deep_copy eines Knotens erzeugt stattdessen
/// eine frische, leere Liste.
#[derive(Clone, Default)]
pub(crate) struct ListenerList {
    entries: Rc<RefCell<Vec<ListenerEntry>>>,
}

impl ListenerList {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registriert einen Callback und gibt sein Handle zurück.
    pub(crate) fn subscribe(&self, callback: ListenerFn) -> ListenerId {
        let id = NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed);
        self.entries.borrow_mut().push(ListenerEntry {
            id,
            callback: Some(callback),
        });
        id
    }

    /// Entfernt einen Callback. Gibt false zurück, wenn das Handle
    /// unbekannt (oder bereits entfernt) ist.
    pub(crate) fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        entries.len() != before
    }

    /// Stellt ein Event synchron an alle registrierten Listener zu,
    /// in Registrierungsreihenfolge.
    ///
    /// Lebendigkeit wird pro Id erneut geprüft: wer während der
    /// Zustellung abgemeldet wurde, wird übersprungen.
    pub(crate) fn dispatch(&self, event: &ChangeEvent) {
        let ids: Vec<ListenerId> = self.entries.borrow().iter().map(|e| e.id).collect();
        for id in ids {
            let taken = {
                let mut entries = self.entries.borrow_mut();
                match entries.iter_mut().find(|e| e.id == id) {
                    Some(entry) => entry.callback.take(),
                    None => continue,
                }
            };
            let Some(mut callback) = taken else { continue };
            callback(event);
            // Zurücklegen nur wenn der Eintrag noch registriert ist.
            let mut entries = self.entries.borrow_mut();
            if let Some(entry) = entries.iter_mut().find(|e| e.id == id) {
                entry.callback = Some(callback);
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

impl fmt::Debug for ListenerList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ListenerList({} registered)", self.len())
    }
}

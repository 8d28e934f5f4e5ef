use crate::model::TicketInfo;

/// One write needed to converge stored tickets with a fresh extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketChange {
    Create(TicketInfo),
    Update(TicketInfo),
}

impl TicketChange {
    pub fn ticket(&self) -> &TicketInfo {
        match self {
            TicketChange::Create(ticket) | TicketChange::Update(ticket) => ticket,
        }
    }
}

/// Computes the creates and updates that bring `stored` in line with `fresh`
///
/// Tickets are matched by position while the fresh list is at least as long
/// as the stored one: changed positions are updated, trailing fresh tickets
/// are created after the highest stored number.
///
/// When the fresh list is shorter, position can no longer tell which tier
/// disappeared, so every stored ticket that is not already sold out is
/// looked up by type instead. A missing type is demoted to sold out, a
/// changed one is updated under the stored ticket's number. With
/// `allow_sold_out_demotion` off the shrink case produces no changes.
pub fn reconcile(
    stored: &[TicketInfo],
    fresh: &[TicketInfo],
    allow_sold_out_demotion: bool,
) -> Vec<TicketChange> {
    let mut changes = Vec::new();

    if fresh.len() >= stored.len() {
        for (existing, latest) in stored.iter().zip(fresh) {
            if latest.has_been_updated(existing) {
                changes.push(TicketChange::Update(latest.renumbered(existing.ticket_num)));
            }
        }

        let mut next_num = stored.iter().map(|t| t.ticket_num).max().unwrap_or(0);
        for latest in &fresh[stored.len()..] {
            next_num += 1;
            changes.push(TicketChange::Create(latest.renumbered(next_num)));
        }
    } else if allow_sold_out_demotion {
        for existing in stored.iter().filter(|t| !t.sold_out) {
            match fresh.iter().find(|t| t.ticket_type == existing.ticket_type) {
                None => changes.push(TicketChange::Update(existing.as_sold_out())),
                Some(latest) if existing.has_been_updated(latest) => {
                    changes.push(TicketChange::Update(latest.renumbered(existing.ticket_num)))
                }
                Some(_) => {}
            }
        }
    }

    changes
}

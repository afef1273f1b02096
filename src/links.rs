// Checkout links. Every offer carries a deterministic metasearch fallback;
// single-carrier itineraries may also get a direct airline link.

use crate::models::{Leg, Passengers};

const FALLBACK_BASE_URL: &str = "https://www.google.com/travel/flights";

// Google Flights search for the exact itinerary, e.g.
// https://www.google.com/travel/flights?hl=pt-PT#flt=GRU.LIS.2025-06-01*LIS.GRU.2025-06-15;c:EUR
pub fn fallback_link(outbound: &Leg, inbound: Option<&Leg>, currency: &str, locale: &str) -> String {
    let mut flt = leg_param(outbound);
    if let Some(inbound) = inbound {
        flt.push('*');
        flt.push_str(&leg_param(inbound));
    }

    format!(
        "{}?hl={}#flt={};c:{}",
        FALLBACK_BASE_URL,
        locale.replace('_', "-"),
        flt,
        currency.to_uppercase()
    )
}

fn leg_param(leg: &Leg) -> String {
    format!(
        "{}.{}.{}",
        leg.origin,
        leg.destination,
        leg.departure_date().format("%Y-%m-%d")
    )
}

// Airline sites we know how to link into. Only LATAM exposes a stable
// search deep link; the others land on the carrier's booking home page.
pub fn carrier_direct_link(
    outbound: &Leg,
    inbound: Option<&Leg>,
    passengers: &Passengers,
) -> Option<String> {
    let mut carriers = outbound.carriers.iter().chain(inbound.into_iter().flat_map(|l| l.carriers.iter()));
    let carrier = carriers.next()?;
    if carriers.any(|c| c != carrier) {
        return None;
    }

    match carrier.as_str() {
        "LA" => {
            let mut link = format!(
                "https://www.latamairlines.com/br/pt/oferta-de-voos?origin={}&destination={}&departureDate={}",
                outbound.origin,
                outbound.destination,
                outbound.departure_date().format("%Y-%m-%d")
            );
            if let Some(inbound) = inbound {
                link.push_str(&format!(
                    "&returnDate={}",
                    inbound.departure_date().format("%Y-%m-%d")
                ));
            }
            link.push_str(&format!(
                "&adt={}&chd={}&inf={}",
                passengers.adults, passengers.children, passengers.infants
            ));
            Some(link)
        }
        "G3" => Some("https://www.voegol.com.br/".to_string()),
        "H2" => Some("https://www.skyairline.com/br/pt".to_string()),
        "JA" | "J4" | "WJ" => Some("https://www.jetsmart.com/br/pt".to_string()),
        "AV" => Some("https://www.avianca.com/br/pt/".to_string()),
        _ => None,
    }
}

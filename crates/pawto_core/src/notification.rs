//! Plain-text emails sent at each lifecycle step.

use crate::collection::Collection;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub fn order_link(app_url: &str, collection: &Collection) -> String {
    format!(
        "{}/order?collectionId={}",
        app_url.trim_end_matches('/'),
        collection.collection_id
    )
}

pub fn status_link(app_url: &str, collection: &Collection) -> String {
    format!(
        "{}/status?collectionId={}&secretKey={}",
        app_url.trim_end_matches('/'),
        collection.collection_id,
        collection.secret_key
    )
}

pub fn results_link(app_url: &str, collection: &Collection) -> String {
    format!(
        "{}/see?collectionId={}&secretKey={}",
        app_url.trim_end_matches('/'),
        collection.collection_id,
        collection.secret_key
    )
}

pub fn collection_created(collection: &Collection, app_url: &str) -> EmailMessage {
    EmailMessage {
        to: collection.email.clone(),
        subject: "[Pawto Album] Your photos have been received".to_string(),
        body: format!(
            "Hi {name},\n\nWe received the photos of your {animal}. Complete the payment \
             to start generating your album:\n{link}\n",
            name = collection.name,
            animal = collection.animal_type,
            link = order_link(app_url, collection),
        ),
    }
}

pub fn payment_confirmed(collection: &Collection, app_url: &str) -> EmailMessage {
    EmailMessage {
        to: collection.email.clone(),
        subject: "[Pawto Album] Payment completed".to_string(),
        body: format!(
            "Hi {name},\n\nYour payment of {price} KRW was confirmed. Track the progress of \
             your album here:\n{link}\n\nReceipt: {receipt}\n",
            name = collection.name,
            price = collection.price,
            link = status_link(app_url, collection),
            receipt = collection.receipt,
        ),
    }
}

pub fn operator_payment_alert(collection: &Collection, operator_email: &str) -> EmailMessage {
    EmailMessage {
        to: operator_email.to_string(),
        subject: format!("[Pawto Album] New paid order {}", collection.collection_id),
        body: format!(
            "Collection {id} ({animal}, {email}) was paid: {price} KRW.\nReceipt: {receipt}\n",
            id = collection.collection_id,
            animal = collection.animal_type,
            email = collection.email,
            price = collection.price,
            receipt = collection.receipt,
        ),
    }
}

pub fn image_ready(collection: &Collection, app_url: &str) -> EmailMessage {
    EmailMessage {
        to: collection.email.clone(),
        subject: "[Pawto Album] Your album is ready".to_string(),
        body: format!(
            "Hi {name},\n\nThe album of your {animal} is ready. The images can be viewed \
             here:\n{link}\n",
            name = collection.name,
            animal = collection.animal_type,
            link = results_link(app_url, collection),
        ),
    }
}

pub fn payment_cancelled(collection: &Collection) -> EmailMessage {
    EmailMessage {
        to: collection.email.clone(),
        subject: "[Pawto Album] Your payment was cancelled".to_string(),
        body: format!(
            "Hi {name},\n\nWe could not generate the album for collection {id}, so your \
             payment of {price} KRW has been cancelled. We are sorry for the inconvenience.\n",
            name = collection.name,
            id = collection.collection_id,
            price = collection.price,
        ),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn collection() -> Collection {
        Collection::new("c-1", "a@b.com", "Rex", "dog", "abc123", Utc::now())
    }

    #[test]
    fn links_carry_identifier_and_secret() {
        let collection = collection();
        assert_eq!(
            status_link("https://pawto.example/", &collection),
            "https://pawto.example/status?collectionId=c-1&secretKey=abc123"
        );
        assert_eq!(
            results_link("https://pawto.example", &collection),
            "https://pawto.example/see?collectionId=c-1&secretKey=abc123"
        );
    }

    #[test]
    fn creation_email_does_not_leak_secret_key() {
        let message = collection_created(&collection(), "https://pawto.example");
        assert_eq!(message.to, "a@b.com");
        assert!(message.body.contains("/order?collectionId=c-1"));
        assert!(!message.body.contains("abc123"));
    }

    #[test]
    fn operator_alert_goes_to_operator() {
        let message = operator_payment_alert(&collection(), "ops@pawto.example");
        assert_eq!(message.to, "ops@pawto.example");
        assert!(message.subject.contains("c-1"));
    }
}

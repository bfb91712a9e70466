//! UI Components

use leptos::prelude::*;

use crate::dispatch::{ContactRow, ContactsView, RenderPhase, Renderer, WeatherReading, argument};
use crate::state::{ChatMessage, ToolCallView};
use crate::theme::{WeatherIcon, adjust_brightness, card_gradient, fahrenheit, theme_color_for};

/// Answer sent back for `go_to_moon`
pub const MOON_CONFIRMED: &str = "confirmed";
pub const MOON_DENIED: &str = "denied";

/// Message bubble with any tool cards it carries
#[component]
pub fn MessageBubble(
    message: ChatMessage,
    theme_color: String,
    pending: Vec<String>,
    on_respond: Callback<(String, String)>,
) -> impl IntoView {
    let class = format!("message message-{}", message.role);
    let text = (!message.content.is_empty()).then(|| {
        view! { <p class="content">{message.content.clone()}</p> }
    });

    let cards = message
        .tool_calls
        .into_iter()
        .map(|call| {
            view! {
                <ToolCard
                    call=call
                    theme_color=theme_color.clone()
                    pending=pending.clone()
                    on_respond=on_respond
                />
            }
        })
        .collect_view();

    view! {
        <div class=class>
            {text}
            {cards}
        </div>
    }
}

/// Card for one tool call, chosen by tool name
#[component]
pub fn ToolCard(
    call: ToolCallView,
    theme_color: String,
    pending: Vec<String>,
    on_respond: Callback<(String, String)>,
) -> impl IntoView {
    let Some(renderer) = Renderer::for_tool(&call.name) else {
        return ().into_any();
    };

    match (RenderPhase::of(&call, renderer, &pending), renderer) {
        (RenderPhase::Pending, _) => view! { <Spinner label=renderer.pending_label() /> }.into_any(),
        (RenderPhase::AwaitingResponse, _) => {
            let id = call.id.clone();
            let respond = Callback::new(move |answer: String| on_respond.run((id.clone(), answer)));
            view! { <MoonCard theme_color=theme_color answer=None on_respond=respond /> }.into_any()
        }
        (RenderPhase::Complete(result), Renderer::Weather) => {
            let location = argument(&call.arguments, "location").unwrap_or_default();
            match WeatherReading::from_result(&result) {
                Ok(reading) => view! { <WeatherCard location=location reading=reading /> }.into_any(),
                Err(message) => view! {
                    <div class="card error-card" data-testid="weather-error">
                        <p class="card-subtitle">{format!("Weather for {location} unavailable")}</p>
                        <p>{message}</p>
                    </div>
                }
                .into_any(),
            }
        }
        (RenderPhase::Complete(result), Renderer::Contacts) => match ContactsView::from_result(&result) {
            ContactsView::Nothing => ().into_any(),
            ContactsView::Single(contact) => {
                view! { <ContactCard contact=contact theme_color=theme_color /> }.into_any()
            }
            ContactsView::Table(contacts) => {
                view! { <ContactList contacts=contacts theme_color=theme_color /> }.into_any()
            }
        },
        (RenderPhase::Complete(result), Renderer::Moon) => {
            let noop = Callback::new(|_: String| {});
            view! { <MoonCard theme_color=theme_color answer=Some(result) on_respond=noop /> }.into_any()
        }
    }
}

#[component]
pub fn Spinner(label: &'static str) -> impl IntoView {
    view! {
        <div class="card spinner-card" style="background-color: #667eea;">
            <span class="spin">"⚙️ "</span>
            {label}
        </div>
    }
}

#[component]
pub fn WeatherCard(location: String, reading: WeatherReading) -> impl IntoView {
    let accent = theme_color_for(&reading.conditions);
    let icon = match WeatherIcon::for_conditions(&reading.conditions) {
        WeatherIcon::Sun => "☀️",
        WeatherIcon::Rain => "🌧️",
        WeatherIcon::Cloud => "☁️",
    };

    view! {
        <div class="card weather-card" data-testid="weather-card" style=card_gradient(accent)>
            <div class="card-header">
                <div>
                    <h3 class="card-title" data-testid="weather-city">{location}</h3>
                    <p class="card-subtitle">"Current Weather"</p>
                </div>
                <div class="card-icon">{icon}</div>
            </div>

            <div class="weather-main">
                <div class="temperature">{reading.temperature}"°"<span class="unit">"C"</span></div>
                <div class="conditions">
                    <div>{reading.conditions.clone()}</div>
                    <div class="muted">{fahrenheit(reading.temperature)}"° F"</div>
                </div>
            </div>

            <div class="weather-stats">
                <div data-testid="weather-humidity">
                    <p class="label">"Humidity"</p>
                    <p class="value">{reading.humidity}"%"</p>
                </div>
                <div data-testid="weather-wind">
                    <p class="label">"Wind"</p>
                    <p class="value">{reading.wind_speed}" mph"</p>
                </div>
                <div data-testid="weather-feels-like">
                    <p class="label">"Feels Like"</p>
                    <p class="value">{reading.feels_like}"°"</p>
                </div>
            </div>
        </div>
    }
}

#[component]
pub fn ContactCard(contact: ContactRow, theme_color: String) -> impl IntoView {
    let email = (!contact.email.is_empty()).then(|| {
        view! {
            <div class="contact-field" data-testid="contact-email">
                <p class="label">"Email"</p>
                <p class="value">{contact.email.clone()}</p>
            </div>
        }
    });
    let phone = (!contact.mobilephone.is_empty()).then(|| {
        view! {
            <div class="contact-field" data-testid="contact-phone">
                <p class="label">"Mobile Phone"</p>
                <p class="value">{contact.mobilephone.clone()}</p>
            </div>
        }
    });

    view! {
        <div class="card contact-card" data-testid="contact-card" style=card_gradient(&theme_color)>
            <div class="card-header">
                <div class="card-icon">"👤"</div>
                <div>
                    <h3 class="card-title" data-testid="contact-name">
                        {format!("{} {}", contact.firstname, contact.lastname)}
                    </h3>
                    <p class="card-subtitle">"Contact Information"</p>
                </div>
            </div>
            {email}
            {phone}
            <div class="contact-field" data-testid="contact-id">
                <p class="label">"Contact ID"</p>
                <p class="value mono">{contact.contactid.clone()}</p>
            </div>
        </div>
    }
}

#[component]
pub fn ContactList(contacts: Vec<ContactRow>, theme_color: String) -> impl IntoView {
    let count = contacts.len();
    let rows = contacts
        .into_iter()
        .map(|c| {
            view! {
                <tr>
                    <td class="name">{format!("{} {}", c.firstname, c.lastname)}</td>
                    <td>{c.email}</td>
                    <td class="mono">{c.mobilephone}</td>
                </tr>
            }
        })
        .collect_view();

    view! {
        <div class="card contact-list" style=card_gradient(&theme_color)>
            <div class="card-header">
                <div>
                    <h3 class="card-title">"Contacts Found"</h3>
                    <p class="card-subtitle">{format!("{count} results found")}</p>
                </div>
            </div>
            <table>
                <thead>
                    <tr>
                        <th>"Name"</th>
                        <th>"Email"</th>
                        <th>"Phone"</th>
                    </tr>
                </thead>
                <tbody>{rows}</tbody>
            </table>
        </div>
    }
}

/// Confirm/deny card for `go_to_moon`; `answer` is set once the user chose
#[component]
pub fn MoonCard(
    theme_color: String,
    answer: Option<String>,
    on_respond: Callback<String>,
) -> impl IntoView {
    let body = match answer.as_deref() {
        None => view! {
            <p>"Ready to launch to the moon?"</p>
            <div class="actions">
                <button class="btn btn-primary" on:click=move |_| on_respond.run(MOON_CONFIRMED.into())>
                    "🚀 Launch"
                </button>
                <button class="btn" on:click=move |_| on_respond.run(MOON_DENIED.into())>
                    "Abort"
                </button>
            </div>
        }
        .into_any(),
        Some(MOON_CONFIRMED) => view! { <p>"🌕 Mission accomplished. Welcome to the moon!"</p> }.into_any(),
        Some(_) => view! { <p>"Mission aborted."</p> }.into_any(),
    };

    view! {
        <div class="card moon-card" style=card_gradient(&theme_color)>
            <h3 class="card-title">"Moon Mission"</h3>
            {body}
        </div>
    }
}

/// Shared state mirror; removing a proverb edits it locally
#[component]
pub fn ProverbsCard(
    proverbs: Vec<String>,
    theme_color: String,
    on_remove: Callback<usize>,
) -> impl IntoView {
    let empty = proverbs.is_empty().then(|| {
        view! { <p class="muted">"No proverbs yet. Ask the assistant to add some!"</p> }
    });
    let items = proverbs
        .into_iter()
        .enumerate()
        .map(|(index, proverb)| {
            view! {
                <li class="proverb">
                    <span>{proverb}</span>
                    <button class="remove" on:click=move |_| on_remove.run(index)>"✕"</button>
                </li>
            }
        })
        .collect_view();

    view! {
        <div class="card proverbs-card" style=format!("border-color: {};", adjust_brightness(&theme_color, -40))>
            <h2>"Proverbs"</h2>
            {empty}
            <ul>{items}</ul>
        </div>
    }
}
